use cup_parse::{parse_str, SyntaxError};

fn err(src: &str) -> SyntaxError {
    parse_str(src).unwrap_err()
}

#[test]
fn missing_closing_paren() {
    assert_eq!(
        err("x = (1 + 2").to_string(),
        "Expected RPAREN, got NEWLINE at line 1, column 11"
    );
}

#[test]
fn missing_colon_after_condition() {
    assert_eq!(
        err("if x\n  y\n").to_string(),
        "Expected COLON, got NEWLINE at line 1, column 5"
    );
}

#[test]
fn missing_expression() {
    assert_eq!(err("x =").to_string(), "Expected expression at line 1, column 4");
    assert_eq!(err("-").to_string(), "Expected expression at line 1, column 2");
    assert_eq!(err("1 +").to_string(), "Expected expression at line 1, column 4");
}

#[test]
fn unsupported_unary_operator() {
    assert_eq!(
        err("* 3").to_string(),
        "Unary operator * is not supported at line 1, column 1"
    );
}

#[test]
fn invalid_assignment_target() {
    assert_eq!(
        err("f(1) = 2").to_string(),
        "Invalid assignment target at line 1, column 1"
    );
}

#[test]
fn collection_errors() {
    assert_eq!(
        err("{1: }").to_string(),
        "Dictionary value expected at line 1, column 5"
    );
    assert_eq!(
        err("a[]").to_string(),
        "Subscript operator key is required at line 1, column 3"
    );
}

#[test]
fn when_needs_a_pattern() {
    assert_eq!(
        err("when x:\n  else:\n    y\n").to_string(),
        "One or more \"when\" pattern expected at line 2, column 3"
    );
}

#[test]
fn leftover_tokens() {
    assert_eq!(err(")").to_string(), "End expected at line 1, column 1");
    assert_eq!(err("else:\n  x\n").to_string(), "End expected at line 1, column 1");
}

#[test]
fn running_out_of_tokens() {
    let e = err("if x:");
    assert_eq!(e.message, "Unexpected end of input");
    assert_eq!((e.line, e.column), (1, 6));
}

#[test]
fn render_points_at_column() {
    let src = "a = 1\nx = $";
    let e = err(src);
    assert_eq!(
        e.render(src),
        "Syntax error: Unexpected character $ at line 2, column 5\nx = $\n    ^"
    );
}
