use cup_parse::{tokenize, Lexer, Tok, TokKind};

fn kinds(src: &str) -> Vec<TokKind> {
    tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
}

fn name(s: &str) -> TokKind {
    TokKind::Name(s.to_string())
}

#[test]
fn block_produces_indent_and_dedent() {
    use TokKind::*;
    assert_eq!(
        kinds("if x:\n    y\nz"),
        vec![
            KwIf, name("x"), Colon, Newline,
            Indent, name("y"), Newline,
            Dedent, name("z"), Newline,
        ]
    );
}

#[test]
fn indents_balance_at_end_of_input() {
    let src = "while a:\n  if b:\n    while c:\n      d\n";
    let toks = kinds(src);
    let indents = toks.iter().filter(|k| **k == TokKind::Indent).count();
    let dedents = toks.iter().filter(|k| **k == TokKind::Dedent).count();
    assert_eq!(indents, 3);
    assert_eq!(indents, dedents);
    assert_eq!(toks.last(), Some(&TokKind::Dedent));
}

#[test]
fn dropping_several_levels_emits_one_dedent_per_level() {
    let toks = kinds("a:\n  b:\n    c\nd");
    let tail: Vec<_> = toks.iter().rev().take(4).cloned().collect();
    assert_eq!(
        tail,
        vec![TokKind::Newline, name("d"), TokKind::Dedent, TokKind::Dedent]
    );
}

#[test]
fn blank_and_comment_lines_do_not_change_indentation() {
    let toks = kinds("if x:\n  y\n\n// note\n      \n  z\n");
    assert_eq!(toks.iter().filter(|k| **k == TokKind::Indent).count(), 1);
    assert_eq!(toks.iter().filter(|k| **k == TokKind::Dedent).count(), 1);
}

#[test]
fn tab_indent_unit() {
    let toks = kinds("if x:\n\ty\n\t\tz\n");
    assert_eq!(toks.iter().filter(|k| **k == TokKind::Indent).count(), 2);
}

#[test]
fn columns_count_from_line_start() {
    let toks = tokenize("if x:\n  yy = 1 // done\n").unwrap();
    let yy = toks.iter().find(|t| t.kind == name("yy")).unwrap();
    assert_eq!((yy.span.line, yy.span.column), (2, 3));

    let indent = toks.iter().find(|t| t.kind == TokKind::Indent).unwrap();
    assert_eq!((indent.span.line, indent.span.column), (2, 3));

    // trimmed line is "  yy = 1 // done"
    let newline = toks
        .iter()
        .filter(|t| t.kind == TokKind::Newline)
        .nth(1)
        .unwrap();
    assert_eq!(newline.span.column, 17);
}

#[test]
fn layout_tokens_have_one_based_columns() {
    let toks = tokenize("a:\n    b:\n        c\n    d\ne\n").unwrap();
    let layout: Vec<_> = toks
        .iter()
        .filter(|t| matches!(t.kind, TokKind::Indent | TokKind::Dedent))
        .map(|t| (t.kind.clone(), t.span.line, t.span.column))
        .collect();
    assert_eq!(
        layout,
        vec![
            (TokKind::Indent, 2, 5),
            (TokKind::Indent, 3, 9),
            (TokKind::Dedent, 4, 5),
            (TokKind::Dedent, 5, 1),
        ]
    );
    assert!(toks.iter().all(|t| t.span.column >= 1));
}

#[test]
fn word_operators_and_keywords() {
    use TokKind::*;
    assert_eq!(
        kinds("for i in xs and not ys"),
        vec![
            KwFor, name("i"), KwIn, name("xs"),
            Operator("and"), Operator("not"), name("ys"), Newline,
        ]
    );
    assert_eq!(kinds("let f"), vec![KwFunction, name("f"), Newline]);
}

/// Source text rebuilt from tokens: spellings joined by spaces, each line
/// led by four spaces per open block.
fn rebuild(toks: &[Tok]) -> String {
    let mut out = String::new();
    let mut level = 0usize;
    let mut line_start = true;
    for tok in toks {
        match tok.kind {
            TokKind::Indent => level += 1,
            TokKind::Dedent => level -= 1,
            TokKind::Newline => {
                out.push('\n');
                line_start = true;
            }
            ref kind => {
                if line_start {
                    out.push_str(&"    ".repeat(level));
                    line_start = false;
                } else {
                    out.push(' ');
                }
                out.push_str(&kind.to_string());
            }
        }
    }
    out
}

#[test]
fn tokens_survive_a_trip_through_source_text() {
    let src = "\
let area(w, h):
  if w <= 0 or h<=0:
    return null
  elif w == h:
    while true:
      quit
  else:
    scale = 1.5 * .25 + 5. - 2 ^ 3 \\ 2
    return [w*h, {'k': \"tab\\there\"}, ('it\\'s', \"back\\\\slash\", '\\q')]
// trailing comment
x = area(3, 4)[-1]
when x:
  is (1,):
    say(x <=> 1.0 >< [2])
";
    let first = tokenize(src).unwrap();
    let text = rebuild(&first);
    let second = tokenize(&text).unwrap();

    let kinds = |toks: &[Tok]| toks.iter().map(|t| t.kind.clone()).collect::<Vec<_>>();
    assert_eq!(kinds(&first), kinds(&second), "rebuilt source:\n{text}");
    // one more trip changes nothing
    assert_eq!(rebuild(&second), text);

    assert!(first.iter().any(|t| t.kind == TokKind::Str("tab\there".into())));
    assert!(first.iter().any(|t| t.kind == TokKind::Str("\\q".into())));
    assert!(first.iter().any(|t| t.kind == TokKind::Float(0.25)));
}

#[test]
fn lexer_can_be_reused() {
    let src = "let f(a):\n  return a ^ 2\nf(3)\n";
    let mut lexer = Lexer::new(src);
    let first = lexer.tokenize().unwrap();
    let second = lexer.tokenize().unwrap();
    assert_eq!(first, second);
    assert_eq!(lexer.source_lines().len(), 3);
}

#[test]
fn unexpected_character_reports_position() {
    let err = tokenize("a = 1\nb $ 2").unwrap_err();
    assert_eq!(err.to_string(), "Unexpected character $ at line 2, column 3");
}

#[test]
fn unterminated_string_points_at_quote() {
    let err = tokenize("x = \"abc").unwrap_err();
    assert_eq!(err.to_string(), "Unexpected character \" at line 1, column 5");
}

#[test]
fn oversized_integer_is_rejected() {
    let err = tokenize("99999999999999999999").unwrap_err();
    assert_eq!((err.line, err.column), (1, 1));
}
