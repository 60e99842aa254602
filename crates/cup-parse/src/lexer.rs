use crate::error::SyntaxError;
use crate::token::{Logic, Tok, TokKind};
use cup_ast::span::Span;

/// Operator spellings in match order; longer forms precede their prefixes.
const OPERATORS: &[&str] = &[
    // bitwise
    "&&", "||", "^^", "<<", ">>",
    // arithmetic
    "+", "-", "*", "/", "\\", "%", "^",
    // comparison
    "<=>", "><", "<=", ">=", "==", "!=", "<", ">",
    // boolean
    "&", "|", "!",
    // unary
    "?", "~",
];

/// Tokenize a whole source text.
pub fn tokenize(src: &str) -> Result<Vec<Tok>, SyntaxError> {
    Lexer::new(src).tokenize()
}

/// Line-oriented tokenizer that turns indentation into `Indent`/`Dedent`.
pub struct Lexer<'a> {
    src: &'a str,
    source_lines: Vec<String>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            source_lines: Vec::new(),
        }
    }

    /// Right-trimmed source lines seen by the last `tokenize` call, blank
    /// lines included, so `source_lines()[line - 1]` is the text of `line`.
    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }

    pub fn tokenize(&mut self) -> Result<Vec<Tok>, SyntaxError> {
        self.source_lines.clear();

        let mut unit: Option<(char, usize)> = None;
        let mut toks = Vec::new();
        let mut last_level = 0usize;
        let mut line_no = 0u32;

        for (idx, raw) in self.src.lines().enumerate() {
            line_no = idx as u32 + 1;
            let line = raw.trim_end();
            self.source_lines.push(line.to_string());
            if line.is_empty() {
                continue;
            }

            if unit.is_none() {
                unit = detect_indent(line);
            }

            let chars: Vec<char> = line.chars().collect();
            let (level, offset) = match unit {
                Some((ch, width)) => {
                    let run = chars.iter().take_while(|&&c| c == ch).count();
                    let level = run / width;
                    (level, level * width)
                }
                None => (0, 0),
            };

            let line_toks = LineScanner::new(&chars, offset, line_no).scan()?;
            // Comment-only lines leave the indentation untouched.
            if line_toks.is_empty() {
                continue;
            }

            // layout tokens sit where the indentation ends
            let column = offset as u32 + 1;
            if level > last_level {
                let indent = Tok::new(TokKind::Indent, line_no, column);
                toks.extend(std::iter::repeat(indent).take(level - last_level));
            } else if level < last_level {
                let dedent = Tok::new(TokKind::Dedent, line_no, column);
                toks.extend(std::iter::repeat(dedent).take(last_level - level));
            }
            last_level = level;

            toks.extend(line_toks);
            toks.push(Tok::new(TokKind::Newline, line_no, chars.len() as u32 + 1));
        }

        let dedent = Tok::new(TokKind::Dedent, line_no, 1);
        toks.extend(std::iter::repeat(dedent).take(last_level));

        log::trace!(
            "tokenized {} lines into {} tokens",
            self.source_lines.len(),
            toks.len()
        );
        Ok(toks)
    }
}

/// The indent unit is the whole leading run of the line's first character,
/// if that character is a space or a tab.
fn detect_indent(line: &str) -> Option<(char, usize)> {
    let first = line.chars().next()?;
    if first != ' ' && first != '\t' {
        return None;
    }
    let width = line.chars().take_while(|&c| c == first).count();
    Some((first, width))
}

fn decode_escape(esc: char) -> Option<char> {
    Some(match esc {
        'r' => '\r',
        'b' => '\u{8}',
        'n' => '\n',
        't' => '\t',
        'a' => '\u{7}',
        'v' => '\u{b}',
        'f' => '\u{c}',
        '\\' => '\\',
        '\'' => '\'',
        '"' => '"',
        _ => return None,
    })
}

struct LineScanner<'l> {
    chars: &'l [char],
    pos: usize,
    line: u32,
}

impl<'l> LineScanner<'l> {
    fn new(chars: &'l [char], offset: usize, line: u32) -> Self {
        Self {
            chars,
            pos: offset,
            line,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn span(&self, at: usize) -> Span {
        Span::new(self.line, at as u32 + 1)
    }

    fn tok(&self, kind: TokKind, start: usize) -> Tok {
        Tok {
            kind,
            span: self.span(start),
        }
    }

    fn scan(mut self) -> Result<Vec<Tok>, SyntaxError> {
        let mut toks = Vec::new();

        while let Some(c) = self.peek() {
            let start = self.pos;

            // line comment: //
            if c == '/' && self.peek2() == Some('/') {
                break;
            }

            if c == '"' || c == '\'' {
                let kind = self.string(c)?;
                toks.push(self.tok(kind, start));
                continue;
            }

            if let Some(kind) = self.number()? {
                toks.push(self.tok(kind, start));
                continue;
            }

            if c.is_ascii_alphabetic() || c == '_' {
                let kind = self.word();
                toks.push(self.tok(kind, start));
                continue;
            }

            if c == ' ' || c == '\t' {
                self.bump();
                continue;
            }

            if let Some(op) = self.operator() {
                toks.push(self.tok(TokKind::Operator(op), start));
                continue;
            }

            let single = match c {
                '=' => Some(TokKind::Assign),
                ':' => Some(TokKind::Colon),
                '(' => Some(TokKind::LParen),
                ')' => Some(TokKind::RParen),
                '[' => Some(TokKind::LBrack),
                ']' => Some(TokKind::RBrack),
                '{' => Some(TokKind::LBrace),
                '}' => Some(TokKind::RBrace),
                ',' => Some(TokKind::Comma),
                ';' => Some(TokKind::Semicolon),
                '.' => Some(TokKind::Dot),
                _ => None,
            };
            if let Some(kind) = single {
                self.bump();
                toks.push(self.tok(kind, start));
                continue;
            }

            return Err(SyntaxError::new(
                format!("Unexpected character {c}"),
                self.span(start),
            ));
        }

        Ok(toks)
    }

    /// Quoted string; an unterminated one is reported at its opening quote.
    fn string(&mut self, quote: char) -> Result<TokKind, SyntaxError> {
        let start = self.pos;
        let unterminated =
            |s: &Self| SyntaxError::new(format!("Unexpected character {quote}"), s.span(start));
        self.bump();

        let mut s = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(unterminated(self));
            };
            if c == quote {
                return Ok(TokKind::Str(s));
            }
            if c == '\\' {
                let Some(esc) = self.bump() else {
                    return Err(unterminated(self));
                };
                match decode_escape(esc) {
                    Some(real) => s.push(real),
                    // unknown escapes are kept verbatim
                    None => {
                        s.push('\\');
                        s.push(esc);
                    }
                }
            } else {
                s.push(c);
            }
        }
    }

    fn digits_from(&self, at: usize) -> usize {
        self.chars[at.min(self.chars.len())..]
            .iter()
            .take_while(|c| c.is_ascii_digit())
            .count()
    }

    /// `\d*\.\d+ | \d+\.\d* | \d+`
    fn number(&mut self) -> Result<Option<TokKind>, SyntaxError> {
        let start = self.pos;
        let int_digits = self.digits_from(start);
        let mut end = start + int_digits;
        let mut is_float = false;

        if self.chars.get(end) == Some(&'.') {
            let frac_digits = self.digits_from(end + 1);
            if int_digits > 0 || frac_digits > 0 {
                is_float = true;
                end += 1 + frac_digits;
            }
        }
        if !is_float && int_digits == 0 {
            return Ok(None);
        }

        let text: String = self.chars[start..end].iter().collect();
        self.pos = end;

        if is_float {
            let normalized = format!("0{text}0");
            let value = normalized.parse::<f64>().map_err(|_| {
                SyntaxError::new(format!("Invalid number {text}"), self.span(start))
            })?;
            Ok(Some(TokKind::Float(value)))
        } else {
            let value = text.parse::<i64>().map_err(|_| {
                SyntaxError::new(format!("Integer literal {text} is too large"), self.span(start))
            })?;
            Ok(Some(TokKind::Int(value)))
        }
    }

    fn word(&mut self) -> TokKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.as_str() {
            "true" => TokKind::Logic(Logic::True),
            "false" => TokKind::Logic(Logic::False),
            "null" => TokKind::Logic(Logic::Null),
            "and" => TokKind::Operator("and"),
            "or" => TokKind::Operator("or"),
            "not" => TokKind::Operator("not"),
            _ => TokKind::keyword(&text).unwrap_or(TokKind::Name(text)),
        }
    }

    fn operator(&mut self) -> Option<&'static str> {
        let rest = &self.chars[self.pos..];
        let op = OPERATORS.iter().copied().find(|op| {
            op.chars().count() <= rest.len() && op.chars().zip(rest.iter()).all(|(a, &b)| a == b)
        })?;
        self.pos += op.chars().count();
        Some(op)
    }
}
