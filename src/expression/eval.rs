//! Full in-memory evaluation of a rule
//!
//! Used by the write guard against a materialized candidate document.

use serde_json::Value;

use super::ast::{Expr, Root};
use super::value::{apply, get_path, truthy};

/// Evaluates an expression to a value
pub fn evaluate(expr: &Expr, auth: &Value, document: &Value) -> Value {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Access(access) => match access.root {
            Root::Auth => get_path(auth, &access.path),
            Root::Document => get_path(document, &access.path),
        },
        Expr::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| evaluate(item, auth, document))
                .collect(),
        ),
        Expr::Not(inner) => Value::Bool(!truthy(&evaluate(inner, auth, document))),
        Expr::And(left, right) => Value::Bool(
            truthy(&evaluate(left, auth, document)) && truthy(&evaluate(right, auth, document)),
        ),
        Expr::Or(left, right) => Value::Bool(
            truthy(&evaluate(left, auth, document)) || truthy(&evaluate(right, auth, document)),
        ),
        Expr::Compare(op, left, right) => Value::Bool(apply(
            *op,
            &evaluate(left, auth, document),
            &evaluate(right, auth, document),
        )),
    }
}

/// Evaluates an expression as a predicate
pub fn run(expr: &Expr, auth: &Value, document: &Value) -> bool {
    truthy(&evaluate(expr, auth, document))
}
