//! General (existential) comparison of sequences.
use crate::ast::ComparisonOp;
use crate::xdm::{Sequence, Value};

/// `a op b` holds iff some item of `a` and some item of `b` satisfy the scalar comparison.
/// An empty operand therefore makes every comparison false, `!=` included.
pub fn general_compare(a: &Sequence, op: ComparisonOp, b: &Sequence) -> bool {
    a.iter().any(|x| b.iter().any(|y| compare_values(x, op, y)))
}

/// Scalar comparison. When the operand kinds differ, both are converted to the kind that
/// comes first in boolean, number, string; nodes compare by their string value.
pub fn compare_values(a: &Value, op: ComparisonOp, b: &Value) -> bool {
    use ComparisonOp::*;
    match (a, b) {
        (Value::Boolean(_), _) | (_, Value::Boolean(_)) => {
            let (x, y) = (a.to_boolean(), b.to_boolean());
            match op {
                Eq => x == y,
                Ne => x != y,
                _ => compare_numbers(f64::from(u8::from(x)), op, f64::from(u8::from(y))),
            }
        }
        (Value::Number(_), _) | (_, Value::Number(_)) => compare_numbers(a.to_number(), op, b.to_number()),
        _ => {
            let (x, y) = (a.string_value(), b.string_value());
            match op {
                Eq => x == y,
                Ne => x != y,
                Lt => x < y,
                Le => x <= y,
                Gt => x > y,
                Ge => x >= y,
            }
        }
    }
}

fn compare_numbers(x: f64, op: ComparisonOp, y: f64) -> bool {
    use ComparisonOp::*;
    match op {
        Eq => x == y,
        Ne => x != y,
        Lt => x < y,
        Le => x <= y,
        Gt => x > y,
        Ge => x >= y,
    }
}
