//! Binary and unary operator semantics.

use std::cmp::Ordering;

use cup_ast::ast::{BinOp, UnOp};

use crate::error::RuntimeError;
use crate::value::Value;

type OpResult = Result<Value, RuntimeError>;

fn unsupported(sym: &str, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::Operator(format!(
        "unsupported operand types for {sym}: '{}' and '{}'",
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn overflow() -> RuntimeError {
    RuntimeError::Value("integer overflow".into())
}

fn domain_error() -> RuntimeError {
    RuntimeError::Value("math domain error".into())
}

/// Numeric operand pair: both integers, or promoted to decimals.
enum Num {
    Ints(i64, i64),
    Floats(f64, f64),
}

fn numbers(lhs: &Value, rhs: &Value) -> Option<Num> {
    Some(match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Num::Ints(*a, *b),
        (Value::Int(a), Value::Float(b)) => Num::Floats(*a as f64, *b),
        (Value::Float(a), Value::Int(b)) => Num::Floats(*a, *b as f64),
        (Value::Float(a), Value::Float(b)) => Num::Floats(*a, *b),
        _ => return None,
    })
}

pub fn binary(op: BinOp, lhs: Value, rhs: Value) -> OpResult {
    use BinOp::*;
    match op {
        Add => add(&lhs, &rhs),
        Sub => arith("-", &lhs, &rhs, i64::checked_sub, |a, b| a - b),
        Mul => mul(&lhs, &rhs),
        Div => div(&lhs, &rhs),
        FloorDiv => floor_div(&lhs, &rhs),
        Mod => modulo(&lhs, &rhs),
        Pow => pow(&lhs, &rhs),
        Shl | Shr => shift(op, &lhs, &rhs),
        BitAnd | BitOr | BitXor => bitwise(op, &lhs, &rhs),
        Eq => Ok(Value::Bool(lhs == rhs)),
        Ne => Ok(Value::Bool(lhs != rhs)),
        Gt | Ge | Lt | Le => relational(op, &lhs, &rhs),
        Disjoint => disjoint(&lhs, &rhs),
        NumEq => Ok(Value::Bool(to_float(&lhs)? == to_float(&rhs)?)),
        // both sides are already evaluated
        And => Ok(Value::Bool(lhs.truthy() && rhs.truthy())),
        Or => Ok(Value::Bool(lhs.truthy() || rhs.truthy())),
    }
}

pub fn unary(op: UnOp, v: Value) -> OpResult {
    match op {
        UnOp::Pos => match v {
            Value::Int(_) | Value::Float(_) => Ok(v),
            other => Err(bad_unary("+", &other)),
        },
        UnOp::Neg => match v {
            Value::Int(n) => n.checked_neg().map(Value::Int).ok_or_else(overflow),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(bad_unary("-", &other)),
        },
        UnOp::Not => Ok(Value::Bool(!v.truthy())),
        UnOp::TypeOf => Ok(Value::str(v.type_name())),
        UnOp::Round => round_half_even(&v),
    }
}

fn bad_unary(sym: &str, v: &Value) -> RuntimeError {
    RuntimeError::Operator(format!(
        "bad operand type for unary {sym}: '{}'",
        v.type_name()
    ))
}

fn arith(
    sym: &str,
    lhs: &Value,
    rhs: &Value,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> OpResult {
    match numbers(lhs, rhs) {
        Some(Num::Ints(a, b)) => int(a, b).map(Value::Int).ok_or_else(overflow),
        Some(Num::Floats(a, b)) => Ok(Value::Float(float(a, b))),
        None => Err(unsupported(sym, lhs, rhs)),
    }
}

fn add(lhs: &Value, rhs: &Value) -> OpResult {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (Value::Shell(a), Value::Shell(b)) => {
            let items = a.iter().chain(b.iter()).cloned().collect();
            Ok(Value::shell(items))
        }
        _ => arith("+", lhs, rhs, i64::checked_add, |a, b| a + b),
    }
}

fn repeat(items: &[Value], times: i64) -> Result<Vec<Value>, RuntimeError> {
    let times = usize::try_from(times).unwrap_or(0);
    if items.is_empty() || times == 0 {
        return Ok(Vec::new());
    }
    let total = items
        .len()
        .checked_mul(times)
        .ok_or_else(|| RuntimeError::Value("repeated sequence is too long".into()))?;
    let mut out = Vec::with_capacity(total);
    for _ in 0..times {
        out.extend(items.iter().cloned());
    }
    Ok(out)
}

fn mul(lhs: &Value, rhs: &Value) -> OpResult {
    match (lhs, rhs) {
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
            let times = usize::try_from(*n).unwrap_or(0);
            if s.len().checked_mul(times).is_none() {
                return Err(RuntimeError::Value("repeated string is too long".into()));
            }
            Ok(Value::Str(s.repeat(times)))
        }
        (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
            Ok(Value::list(repeat(&items.borrow(), *n)?))
        }
        (Value::Shell(items), Value::Int(n)) | (Value::Int(n), Value::Shell(items)) => {
            Ok(Value::shell(repeat(items, *n)?))
        }
        _ => arith("*", lhs, rhs, i64::checked_mul, |a, b| a * b),
    }
}

fn div(lhs: &Value, rhs: &Value) -> OpResult {
    let (a, b) = match numbers(lhs, rhs) {
        Some(Num::Ints(a, b)) => (a as f64, b as f64),
        Some(Num::Floats(a, b)) => (a, b),
        None => return Err(unsupported("/", lhs, rhs)),
    };
    if b == 0.0 {
        return Err(RuntimeError::ZeroDivision("division by zero".into()));
    }
    Ok(Value::Float(a / b))
}

fn floor_div(lhs: &Value, rhs: &Value) -> OpResult {
    match numbers(lhs, rhs) {
        Some(Num::Ints(_, 0)) => Err(RuntimeError::ZeroDivision(
            "integer division by zero".into(),
        )),
        Some(Num::Ints(a, b)) => {
            let q = a.checked_div(b).ok_or_else(overflow)?;
            // round toward negative infinity
            if a % b != 0 && ((a < 0) != (b < 0)) {
                Ok(Value::Int(q - 1))
            } else {
                Ok(Value::Int(q))
            }
        }
        Some(Num::Floats(_, b)) if b == 0.0 => Err(RuntimeError::ZeroDivision(
            "float floor division by zero".into(),
        )),
        Some(Num::Floats(a, b)) => Ok(Value::Float((a / b).floor())),
        None => Err(unsupported("\\", lhs, rhs)),
    }
}

/// Result takes the sign of the divisor.
fn modulo(lhs: &Value, rhs: &Value) -> OpResult {
    match numbers(lhs, rhs) {
        Some(Num::Ints(_, 0)) => Err(RuntimeError::ZeroDivision(
            "integer modulo by zero".into(),
        )),
        Some(Num::Ints(a, b)) => {
            // i64::MIN % -1 is 0, not an overflow
            let r = a.wrapping_rem(b);
            if r != 0 && ((r < 0) != (b < 0)) {
                Ok(Value::Int(r + b))
            } else {
                Ok(Value::Int(r))
            }
        }
        Some(Num::Floats(_, b)) if b == 0.0 => {
            Err(RuntimeError::ZeroDivision("float modulo".into()))
        }
        Some(Num::Floats(a, b)) => {
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                Ok(Value::Float(r + b))
            } else {
                Ok(Value::Float(r))
            }
        }
        None => Err(unsupported("%", lhs, rhs)),
    }
}

fn pow(lhs: &Value, rhs: &Value) -> OpResult {
    let (a, b) = match numbers(lhs, rhs) {
        Some(Num::Ints(a, b)) if b >= 0 => {
            return u32::try_from(b)
                .ok()
                .and_then(|e| a.checked_pow(e))
                .map(Value::Int)
                .ok_or_else(overflow);
        }
        Some(Num::Ints(a, b)) => (a as f64, b as f64),
        Some(Num::Floats(a, b)) => (a, b),
        None => return Err(unsupported("^", lhs, rhs)),
    };
    if a == 0.0 && b < 0.0 {
        return Err(RuntimeError::ZeroDivision(
            "0 cannot be raised to a negative power".into(),
        ));
    }
    let r = a.powf(b);
    if r.is_nan() && !a.is_nan() && !b.is_nan() {
        return Err(domain_error());
    }
    Ok(Value::Float(r))
}

fn shift(op: BinOp, lhs: &Value, rhs: &Value) -> OpResult {
    let (Value::Int(a), Value::Int(b)) = (lhs, rhs) else {
        return Err(unsupported(op.symbol(), lhs, rhs));
    };
    let (a, b) = (*a, *b);
    if b < 0 {
        return Err(RuntimeError::Value("negative shift count".into()));
    }
    match op {
        BinOp::Shl => {
            if a == 0 {
                return Ok(Value::Int(0));
            }
            if b >= 63 {
                return Err(overflow());
            }
            let r = a << b;
            if r >> b != a {
                return Err(overflow());
            }
            Ok(Value::Int(r))
        }
        _ if b >= 64 => Ok(Value::Int(if a < 0 { -1 } else { 0 })),
        _ => Ok(Value::Int(a >> b)),
    }
}

fn bitwise(op: BinOp, lhs: &Value, rhs: &Value) -> OpResult {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(match op {
            BinOp::BitAnd => a & b,
            BinOp::BitOr => a | b,
            _ => a ^ b,
        })),
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(match op {
            BinOp::BitAnd => a & b,
            BinOp::BitOr => a | b,
            _ => a ^ b,
        })),
        _ => Err(unsupported(op.symbol(), lhs, rhs)),
    }
}

/// Ordering of two values; `None` when unordered (a NaN is involved).
pub fn compare(lhs: &Value, rhs: &Value) -> Result<Option<Ordering>, RuntimeError> {
    if let Some(n) = numbers(lhs, rhs) {
        return Ok(match n {
            Num::Ints(a, b) => Some(a.cmp(&b)),
            Num::Floats(a, b) => a.partial_cmp(&b),
        });
    }
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (Value::Bool(a), Value::Bool(b)) => Ok(Some(a.cmp(b))),
        (Value::List(a), Value::List(b)) => compare_seq(&a.borrow(), &b.borrow()),
        (Value::Shell(a), Value::Shell(b)) => compare_seq(a, b),
        _ => Err(RuntimeError::Operator(format!(
            "comparison not supported between '{}' and '{}'",
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

fn compare_seq(a: &[Value], b: &[Value]) -> Result<Option<Ordering>, RuntimeError> {
    for (x, y) in a.iter().zip(b) {
        if x != y {
            return compare(x, y);
        }
    }
    Ok(Some(a.len().cmp(&b.len())))
}

fn relational(op: BinOp, lhs: &Value, rhs: &Value) -> OpResult {
    let Some(ord) = compare(lhs, rhs)? else {
        return Ok(Value::Bool(false));
    };
    Ok(Value::Bool(match op {
        BinOp::Gt => ord.is_gt(),
        BinOp::Ge => ord.is_ge(),
        BinOp::Lt => ord.is_lt(),
        _ => ord.is_le(),
    }))
}

fn disjoint(lhs: &Value, rhs: &Value) -> OpResult {
    let a = lhs.iter_values()?;
    let b = rhs.iter_values()?;
    Ok(Value::Bool(!a.iter().any(|x| b.contains(x))))
}

/// Decimal coercion used by `<=>`; strings are parsed.
pub fn to_float(v: &Value) -> Result<f64, RuntimeError> {
    if let Some(f) = v.as_number() {
        return Ok(f);
    }
    match v {
        Value::Str(s) => s.trim().parse::<f64>().map_err(|_| {
            RuntimeError::Value(format!("could not convert string to decimal: '{s}'"))
        }),
        other => Err(RuntimeError::Type(format!(
            "'{}' cannot be converted to decimal",
            other.type_name()
        ))),
    }
}

pub fn float_to_int(f: f64) -> Result<i64, RuntimeError> {
    if !f.is_finite() {
        return Err(RuntimeError::Value(format!(
            "cannot convert decimal {} to integer",
            Value::Float(f)
        )));
    }
    // i64::MIN is exactly representable; i64::MAX is not
    if f < i64::MIN as f64 || f >= -(i64::MIN as f64) {
        return Err(overflow());
    }
    Ok(f as i64)
}

/// `~`: nearest integer, ties to even.
pub fn round_half_even(v: &Value) -> OpResult {
    match v {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(f) => float_to_int(f.round_ties_even()).map(Value::Int),
        other => Err(RuntimeError::Type(format!(
            "type '{}' doesn't define rounding",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(op: BinOp, a: Value, b: Value) -> Value {
        binary(op, a, b).unwrap()
    }

    #[test]
    fn floor_division_and_modulo_follow_divisor_sign() {
        assert_eq!(bin(BinOp::FloorDiv, Value::Int(7), Value::Int(2)), Value::Int(3));
        assert_eq!(bin(BinOp::FloorDiv, Value::Int(-7), Value::Int(2)), Value::Int(-4));
        assert_eq!(bin(BinOp::Mod, Value::Int(-7), Value::Int(3)), Value::Int(2));
        assert_eq!(bin(BinOp::Mod, Value::Int(7), Value::Int(-3)), Value::Int(-2));
        assert_eq!(
            bin(BinOp::Mod, Value::Float(-1.5), Value::Int(1)),
            Value::Float(0.5)
        );
    }

    #[test]
    fn modulo_of_min_by_minus_one_is_zero() {
        assert_eq!(bin(BinOp::Mod, Value::Int(i64::MIN), Value::Int(-1)), Value::Int(0));
        let err = binary(BinOp::FloorDiv, Value::Int(i64::MIN), Value::Int(-1)).unwrap_err();
        assert_eq!(err.to_string(), "ValueError: integer overflow");
    }

    #[test]
    fn true_division_is_decimal() {
        assert!(matches!(
            bin(BinOp::Div, Value::Int(6), Value::Int(3)),
            Value::Float(f) if f == 2.0
        ));
        let err = binary(BinOp::Div, Value::Int(1), Value::Int(0)).unwrap_err();
        assert_eq!(err.kind(), "ZeroDivisionError");
    }

    #[test]
    fn power() {
        assert!(matches!(bin(BinOp::Pow, Value::Int(2), Value::Int(10)), Value::Int(1024)));
        assert!(matches!(
            bin(BinOp::Pow, Value::Int(2), Value::Int(-1)),
            Value::Float(f) if f == 0.5
        ));
        assert_eq!(
            binary(BinOp::Pow, Value::Int(10), Value::Int(40))
                .unwrap_err()
                .kind(),
            "ValueError"
        );
    }

    #[test]
    fn sequences() {
        assert_eq!(
            bin(BinOp::Add, Value::str("ab"), Value::str("cd")),
            Value::str("abcd")
        );
        assert_eq!(bin(BinOp::Mul, Value::str("ab"), Value::Int(3)), Value::str("ababab"));
        assert_eq!(bin(BinOp::Mul, Value::str("ab"), Value::Int(-1)), Value::str(""));
        assert_eq!(
            bin(
                BinOp::Add,
                Value::list(vec![Value::Int(1)]),
                Value::list(vec![Value::Int(2)])
            ),
            Value::list(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn mismatched_operands() {
        let err = binary(BinOp::Add, Value::Int(1), Value::str("a")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "OperatorError: unsupported operand types for +: 'integer' and 'string'"
        );
    }

    #[test]
    fn comparisons() {
        assert_eq!(bin(BinOp::Lt, Value::Int(1), Value::Float(1.5)), Value::Bool(true));
        assert_eq!(bin(BinOp::Ge, Value::str("b"), Value::str("a")), Value::Bool(true));
        assert_eq!(
            bin(
                BinOp::Lt,
                Value::list(vec![Value::Int(1), Value::Int(2)]),
                Value::list(vec![Value::Int(1), Value::Int(3)])
            ),
            Value::Bool(true)
        );
        assert!(binary(BinOp::Lt, Value::Int(1), Value::str("a")).is_err());
    }

    #[test]
    fn disjoint_and_numeric_equality() {
        let a = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::list(vec![Value::Int(3)]);
        assert_eq!(bin(BinOp::Disjoint, a.clone(), b), Value::Bool(true));
        assert_eq!(bin(BinOp::Disjoint, a.clone(), a), Value::Bool(false));
        assert_eq!(bin(BinOp::NumEq, Value::str("2.0"), Value::Int(2)), Value::Bool(true));
    }

    #[test]
    fn logical_operators_coerce_both_sides() {
        assert_eq!(bin(BinOp::And, Value::Int(1), Value::str("x")), Value::Bool(true));
        assert_eq!(bin(BinOp::Or, Value::Null, Value::Int(0)), Value::Bool(false));
    }

    #[test]
    fn bitwise_and_shifts() {
        assert_eq!(bin(BinOp::BitAnd, Value::Int(6), Value::Int(3)), Value::Int(2));
        assert_eq!(bin(BinOp::BitXor, Value::Int(6), Value::Int(3)), Value::Int(5));
        assert_eq!(
            bin(BinOp::BitOr, Value::Bool(false), Value::Bool(true)),
            Value::Bool(true)
        );
        assert_eq!(bin(BinOp::Shl, Value::Int(1), Value::Int(4)), Value::Int(16));
        assert_eq!(bin(BinOp::Shr, Value::Int(-9), Value::Int(1)), Value::Int(-5));
    }

    #[test]
    fn unary_operators() {
        assert_eq!(unary(UnOp::Neg, Value::Int(3)).unwrap(), Value::Int(-3));
        assert_eq!(unary(UnOp::Not, Value::str("")).unwrap(), Value::Bool(true));
        assert_eq!(unary(UnOp::TypeOf, Value::Float(1.0)).unwrap(), Value::str("decimal"));
        assert_eq!(unary(UnOp::Round, Value::Float(2.5)).unwrap(), Value::Int(2));
        assert_eq!(unary(UnOp::Round, Value::Float(3.5)).unwrap(), Value::Int(4));
        assert!(unary(UnOp::Neg, Value::str("a")).is_err());
    }
}
