use cup_ast::ast::{Lit, Node};
use cup_parse::parse_str;

/// Fully parenthesized rendering of an expression tree.
fn show(n: &Node) -> String {
    match n {
        Node::Lit(Lit::Int(v), _) => v.to_string(),
        Node::Ident(id) => id.text.clone(),
        Node::Binary { op, lhs, rhs, .. } => {
            format!("({} {} {})", show(lhs), op.symbol(), show(rhs))
        }
        Node::Unary { op, expr, .. } => format!("({}{})", op.symbol(), show(expr)),
        Node::Call { callee, args, .. } => {
            let args: Vec<_> = args.iter().map(show).collect();
            format!("{}({})", show(callee), args.join(", "))
        }
        Node::Subscript { target, key, .. } => format!("{}[{}]", show(target), show(key)),
        other => panic!("unexpected node {other:?}"),
    }
}

fn expr(src: &str) -> String {
    let prog = parse_str(src).unwrap();
    assert_eq!(prog.body.len(), 1);
    show(&prog.body[0])
}

#[test]
fn multiplicative_over_additive() {
    assert_eq!(expr("1 + 2 * 3"), "(1 + (2 * 3))");
    assert_eq!(expr("1 * 2 + 3"), "((1 * 2) + 3)");
    assert_eq!(expr("a % b \\ c / d"), "(((a % b) \\ c) / d)");
}

#[test]
fn equal_power_groups_left() {
    assert_eq!(expr("1 - 2 - 3"), "((1 - 2) - 3)");
    assert_eq!(expr("2 ^ 3 ^ 2"), "((2 ^ 3) ^ 2)");
}

#[test]
fn power_binds_tighter_than_unary() {
    assert_eq!(expr("-2 ^ 2"), "(-(2 ^ 2))");
    assert_eq!(expr("-a * b"), "((-a) * b)");
}

#[test]
fn logical_and_over_or() {
    assert_eq!(expr("a or b and c"), "(a or (b and c))");
    assert_eq!(expr("a | b & c"), "(a or (b and c))");
}

#[test]
fn comparison_ladder() {
    assert_eq!(expr("a == b < c"), "((a == b) < c)");
    assert_eq!(expr("a < b & c >= d"), "((a < b) and (c >= d))");
    assert_eq!(expr("a <=> b >< c"), "((a <=> b) >< c)");
}

#[test]
fn bitwise_ladder() {
    assert_eq!(expr("a && b ^^ c || d"), "(((a && b) ^^ c) || d)");
    assert_eq!(expr("1 + 2 << 3"), "((1 + 2) << 3)");
    assert_eq!(expr("a || b == c"), "((a || b) == c)");
}

#[test]
fn postfix_binds_tightest() {
    assert_eq!(expr("f(1)[0] + 2"), "(f(1)[0] + 2)");
    assert_eq!(expr("-xs[1]"), "(-xs[1])");
    assert_eq!(expr("g(a, b + 1)"), "g(a, (b + 1))");
}

#[test]
fn not_applies_to_the_operand_only() {
    assert_eq!(expr("not a == b"), "((!a) == b)");
    assert_eq!(expr("!!a"), "(!(!a))");
}

#[test]
fn unary_only_operator_ends_expression() {
    let err = parse_str("a ? b").unwrap_err();
    assert_eq!(err.to_string(), "Expected NEWLINE, got OPERATOR at line 1, column 3");
}
