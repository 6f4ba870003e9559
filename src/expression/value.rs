//! Value semantics shared by in-memory evaluation and the reference store
//!
//! Both `run` and the store-side match evaluator use these helpers, so a
//! compiled fragment and an in-memory evaluation of the same rule agree.

use std::cmp::Ordering;

use serde_json::Value;

use super::ast::CompareOp;

/// Resolves a path on a value. Missing segments resolve to `Null`.
///
/// Numeric segments index into arrays. A non-numeric segment applied to an
/// array maps over its elements and collects the present results, so
/// `categories.title` on a joined one-to-many relation yields all titles.
pub fn get_path(value: &Value, path: &[String]) -> Value {
    let Some((head, rest)) = path.split_first() else {
        return value.clone();
    };

    match value {
        Value::Object(map) => match map.get(head) {
            Some(child) => get_path(child, rest),
            None => Value::Null,
        },
        Value::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                return items
                    .get(index)
                    .map(|item| get_path(item, rest))
                    .unwrap_or(Value::Null);
            }
            let collected: Vec<Value> = items
                .iter()
                .map(|item| get_path(item, path))
                .filter(|v| !v.is_null())
                .collect();
            Value::Array(collected)
        }
        _ => Value::Null,
    }
}

/// Splits a dotted field name into path segments
pub fn split_field(field: &str) -> Vec<String> {
    if field.is_empty() {
        return Vec::new();
    }
    field.split('.').map(str::to_string).collect()
}

/// Truthiness: `null`, `false`, `0`, `""` are falsy; everything else is truthy
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Orders two values of the same kind; mixed kinds are unordered
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(ai), Some(bi)) = (a.as_i64(), b.as_i64()) {
                return Some(ai.cmp(&bi));
            }
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Equality with numeric normalization (`1 == 1.0`)
pub fn equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => compare(left, right) == Some(Ordering::Equal),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equals(x, y))
        }
        _ => left == right,
    }
}

/// Membership: array contains element, or string contains substring
pub fn has(container: &Value, item: &Value) -> bool {
    match (container, item) {
        (Value::Array(items), item) => items.iter().any(|candidate| equals(candidate, item)),
        (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
        _ => false,
    }
}

/// Applies a comparison operator to two resolved values
pub fn apply(op: CompareOp, left: &Value, right: &Value) -> bool {
    match op {
        CompareOp::Eq => equals(left, right),
        CompareOp::Ne => !equals(left, right),
        CompareOp::Gt => compare(left, right) == Some(Ordering::Greater),
        CompareOp::Gte => matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::Lt => compare(left, right) == Some(Ordering::Less),
        CompareOp::Lte => matches!(compare(left, right), Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Has => has(left, right),
    }
}
