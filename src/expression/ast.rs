//! Rule expression AST
//!
//! Parsed once per rule; compiled into store fragments or evaluated in memory.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered property path segments, e.g. `["author", "address", "city"]`
pub type PropertyPath = Vec<String>;

/// The two namespaces a rule may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Root {
    Auth,
    Document,
}

impl Root {
    pub fn as_str(&self) -> &'static str {
        match self {
            Root::Auth => "auth",
            Root::Document => "document",
        }
    }

    pub fn from_ident(name: &str) -> Option<Self> {
        match name {
            "auth" => Some(Root::Auth),
            "document" => Some(Root::Document),
            _ => None,
        }
    }
}

/// A property access such as `document.author.name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Access {
    pub root: Root,
    /// Segments after the root
    pub path: PropertyPath,
}

impl Access {
    /// Full path including the root segment
    pub fn full_path(&self) -> PropertyPath {
        let mut full = Vec::with_capacity(self.path.len() + 1);
        full.push(self.root.as_str().to_string());
        full.extend(self.path.iter().cloned());
        full
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.as_str())?;
        for segment in &self.path {
            write!(f, ".{}", segment)?;
        }
        Ok(())
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Array membership or substring containment
    Has,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Has => "has",
        }
    }
}

/// Rule expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Array(Vec<Expr>),
    Access(Access),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Visits every property access in source order
    pub fn for_each_access<'a>(&'a self, f: &mut impl FnMut(&'a Access)) {
        match self {
            Expr::Literal(_) => {}
            Expr::Access(access) => f(access),
            Expr::Array(items) => items.iter().for_each(|item| item.for_each_access(f)),
            Expr::Not(inner) => inner.for_each_access(f),
            Expr::And(l, r) | Expr::Or(l, r) | Expr::Compare(_, l, r) => {
                l.for_each_access(f);
                r.for_each_access(f);
            }
        }
    }
}
