//! Rule expression engine
//!
//! A small boolean language over two namespaces, `auth` and `document`:
//!
//! ```text
//! auth.policies has "Admin" || document.owner == auth._id
//! ```
//!
//! Rules are parsed once into a typed AST (`Rule`) and then either
//! - statically inspected (`property_map`),
//! - compiled into a store fragment with `auth` inlined (`aggregate`), or
//! - fully evaluated in memory (`run`).

mod ast;
mod compile;
mod errors;
mod eval;
mod filter;
mod fragment;
mod lexer;
mod parser;
pub mod value;

pub use ast::{Access, CompareOp, Expr, PropertyPath, Root};
pub use errors::{ExpressionError, ExpressionResult};
pub use filter::{translate as translate_filter, StructuredFilter};
pub use fragment::{MatchExpr, Pattern};
pub use parser::MAX_DEPTH;

use serde_json::Value;

/// The allow-all sentinel rule
pub const DEFAULT_RULE: &str = "true==true";

/// A parsed rule expression
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    source: String,
    expr: Expr,
}

impl Rule {
    /// Parses rule source
    pub fn parse(source: &str) -> ExpressionResult<Self> {
        Ok(Self {
            source: source.to_string(),
            expr: parser::parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Every `auth.*` / `document.*` path referenced, root included,
    /// deduplicated in first-appearance order
    pub fn property_map(&self) -> Vec<PropertyPath> {
        let mut paths: Vec<PropertyPath> = Vec::new();
        self.expr.for_each_access(&mut |access| {
            let full = access.full_path();
            if !paths.contains(&full) {
                paths.push(full);
            }
        });
        paths
    }

    /// Compiles into a store fragment with `auth` inlined
    pub fn aggregate(&self, auth: &Value) -> MatchExpr {
        compile::compile(&self.expr, auth)
    }

    /// Evaluates against concrete values
    pub fn run(&self, auth: &Value, document: &Value) -> bool {
        eval::run(&self.expr, auth, document)
    }

    /// True for the allow-all sentinel
    pub fn is_default(&self) -> bool {
        is_default_rule(&self.source)
    }
}

/// Extracts referenced property paths without evaluating
pub fn extract_property_map(source: &str) -> ExpressionResult<Vec<PropertyPath>> {
    Ok(Rule::parse(source)?.property_map())
}

/// Compiles rule source into a store fragment
pub fn aggregate(source: &str, auth: &Value) -> ExpressionResult<MatchExpr> {
    Ok(Rule::parse(source)?.aggregate(auth))
}

/// Parses and evaluates rule source
pub fn run(source: &str, auth: &Value, document: &Value) -> ExpressionResult<bool> {
    Ok(Rule::parse(source)?.run(auth, document))
}

/// Whitespace-insensitive comparison against `true==true`
pub fn is_default_rule(source: &str) -> bool {
    source
        .chars()
        .filter(|c| !c.is_whitespace())
        .eq(DEFAULT_RULE.chars())
}

/// Splits rooted paths into (`auth` paths, `document` paths), roots stripped
pub fn split_by_root(paths: &[PropertyPath]) -> (Vec<PropertyPath>, Vec<PropertyPath>) {
    let mut auth = Vec::new();
    let mut document = Vec::new();
    for path in paths {
        let Some((head, rest)) = path.split_first() else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        match Root::from_ident(head) {
            Some(Root::Auth) => auth.push(rest.to_vec()),
            Some(Root::Document) => document.push(rest.to_vec()),
            None => {}
        }
    }
    (auth, document)
}
