//! Partial evaluation of a rule into a store fragment
//!
//! `auth` is known at compile time and gets inlined. `document` references
//! stay symbolic as field paths.

use serde_json::Value;

use super::ast::{Expr, Root};
use super::fragment::MatchExpr;
use super::value::{apply, get_path};

/// Compiles an expression against a materialized `auth` value
pub fn compile(expr: &Expr, auth: &Value) -> MatchExpr {
    match expr {
        Expr::Literal(v) => MatchExpr::Literal(v.clone()),
        Expr::Access(access) => match access.root {
            Root::Auth => MatchExpr::Literal(get_path(auth, &access.path)),
            Root::Document => MatchExpr::Field(access.path.join(".")),
        },
        Expr::Array(items) => {
            let compiled: Vec<MatchExpr> = items.iter().map(|i| compile(i, auth)).collect();
            let literals: Option<Vec<Value>> = compiled
                .iter()
                .map(|c| match c {
                    MatchExpr::Literal(v) => Some(v.clone()),
                    _ => None,
                })
                .collect();
            match literals {
                Some(values) => MatchExpr::Literal(Value::Array(values)),
                None => MatchExpr::Array(compiled),
            }
        }
        Expr::Not(inner) => MatchExpr::not(compile(inner, auth)),
        Expr::And(left, right) => MatchExpr::and(vec![compile(left, auth), compile(right, auth)]),
        Expr::Or(left, right) => MatchExpr::or(vec![compile(left, auth), compile(right, auth)]),
        Expr::Compare(op, left, right) => {
            let left = compile(left, auth);
            let right = compile(right, auth);
            match (&left, &right) {
                (MatchExpr::Literal(l), MatchExpr::Literal(r)) => {
                    MatchExpr::Literal(Value::Bool(apply(*op, l, r)))
                }
                _ => MatchExpr::compare(*op, left, right),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ast::CompareOp;
    use crate::expression::parser::parse;
    use serde_json::json;

    fn compile_str(source: &str, auth: &Value) -> MatchExpr {
        compile(&parse(source).unwrap(), auth)
    }

    #[test]
    fn test_auth_inlined_document_symbolic() {
        let fragment = compile_str("document.owner == auth._id", &json!({"_id": "u1"}));
        assert_eq!(
            fragment,
            MatchExpr::compare(
                CompareOp::Eq,
                MatchExpr::field("owner"),
                MatchExpr::literal(json!("u1"))
            )
        );
    }

    #[test]
    fn test_default_rule_folds_to_true() {
        assert!(compile_str("true==true", &json!({})).is_trivially_true());
    }

    #[test]
    fn test_auth_only_rule_folds() {
        let admin = json!({"policies": ["Admin"]});
        let user = json!({"policies": ["User"]});
        let source = "auth.policies has 'Admin' || document.public == true";

        assert!(compile_str(source, &admin).is_trivially_true());
        assert_eq!(
            compile_str(source, &user),
            MatchExpr::compare(
                CompareOp::Eq,
                MatchExpr::field("public"),
                MatchExpr::literal(json!(true))
            )
        );
    }

    #[test]
    fn test_missing_auth_path_is_null() {
        let fragment = compile_str("auth.missing.deep == null", &json!({}));
        assert!(fragment.is_trivially_true());
    }

    #[test]
    fn test_nested_document_path_joined() {
        let fragment = compile_str("document.author.name == 'x'", &json!({}));
        assert!(fragment.matches(&json!({"author": {"name": "x"}})));
        assert!(!fragment.matches(&json!({"author": "id-only"})));
    }
}
