//! Store-native predicate fragments
//!
//! A `MatchExpr` is what a `Match` stage carries. `auth` references have
//! already been inlined as literals; `document` references are field paths the
//! store resolves per document at execution time.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::ast::CompareOp;
use super::value::{apply, get_path, split_field, truthy};

/// Boolean predicate evaluated by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchExpr {
    /// Inlined constant
    Literal(Value),
    /// Dotted document field path; empty string is the document itself
    Field(String),
    Array(Vec<MatchExpr>),
    Compare {
        op: CompareOp,
        left: Box<MatchExpr>,
        right: Box<MatchExpr>,
    },
    And(Vec<MatchExpr>),
    Or(Vec<MatchExpr>),
    Not(Box<MatchExpr>),
    /// Field presence (non-null)
    Exists { field: String, exists: bool },
    /// Regular expression match on a string field
    Regex { field: String, pattern: Pattern },
}

/// Regular expression compiled once when the fragment is built or
/// deserialized. Serializes as its source text.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Pattern::new(&source).map_err(serde::de::Error::custom)
    }
}

impl MatchExpr {
    pub fn always() -> Self {
        MatchExpr::Literal(Value::Bool(true))
    }

    pub fn field(name: impl Into<String>) -> Self {
        MatchExpr::Field(name.into())
    }

    pub fn literal(value: Value) -> Self {
        MatchExpr::Literal(value)
    }

    pub fn compare(op: CompareOp, left: MatchExpr, right: MatchExpr) -> Self {
        MatchExpr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `field == value`
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::compare(CompareOp::Eq, MatchExpr::field(field), MatchExpr::literal(value))
    }

    /// Returns the constant truth value if this fragment does not depend on
    /// the document
    pub fn constant(&self) -> Option<bool> {
        match self {
            MatchExpr::Literal(v) => Some(truthy(v)),
            _ => None,
        }
    }

    /// True when the fragment can never narrow a result set
    pub fn is_trivially_true(&self) -> bool {
        self.constant() == Some(true)
    }

    /// Resolves this fragment to a value against a document
    pub fn resolve(&self, document: &Value) -> Value {
        match self {
            MatchExpr::Literal(v) => v.clone(),
            MatchExpr::Field(name) => get_path(document, &split_field(name)),
            MatchExpr::Array(items) => {
                Value::Array(items.iter().map(|item| item.resolve(document)).collect())
            }
            MatchExpr::Compare { op, left, right } => {
                Value::Bool(apply(*op, &left.resolve(document), &right.resolve(document)))
            }
            MatchExpr::And(items) => Value::Bool(items.iter().all(|item| item.matches(document))),
            MatchExpr::Or(items) => Value::Bool(items.iter().any(|item| item.matches(document))),
            MatchExpr::Not(inner) => Value::Bool(!inner.matches(document)),
            MatchExpr::Exists { field, exists } => {
                let present = !get_path(document, &split_field(field)).is_null();
                Value::Bool(present == *exists)
            }
            MatchExpr::Regex { field, pattern } => {
                let matched = match get_path(document, &split_field(field)) {
                    Value::String(s) => pattern.is_match(&s),
                    _ => false,
                };
                Value::Bool(matched)
            }
        }
    }

    /// Evaluates this fragment as a predicate against a document
    pub fn matches(&self, document: &Value) -> bool {
        truthy(&self.resolve(document))
    }

    /// Conjunction with constant folding
    pub fn and(items: Vec<MatchExpr>) -> MatchExpr {
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            match item.constant() {
                Some(true) => continue,
                Some(false) => return MatchExpr::Literal(Value::Bool(false)),
                None => kept.push(item),
            }
        }
        match kept.len() {
            0 => MatchExpr::always(),
            1 => kept.remove(0),
            _ => MatchExpr::And(kept),
        }
    }

    /// Disjunction with constant folding
    pub fn or(items: Vec<MatchExpr>) -> MatchExpr {
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            match item.constant() {
                Some(true) => return MatchExpr::always(),
                Some(false) => continue,
                None => kept.push(item),
            }
        }
        match kept.len() {
            0 => MatchExpr::Literal(Value::Bool(false)),
            1 => kept.remove(0),
            _ => MatchExpr::Or(kept),
        }
    }

    /// Negation with constant folding
    pub fn not(inner: MatchExpr) -> MatchExpr {
        match inner.constant() {
            Some(b) => MatchExpr::Literal(Value::Bool(!b)),
            None => MatchExpr::Not(Box::new(inner)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_comparison() {
        let expr = MatchExpr::eq("owner", json!("u1"));
        assert!(expr.matches(&json!({"owner": "u1"})));
        assert!(!expr.matches(&json!({"owner": "u2"})));
        assert!(!expr.matches(&json!({})));
    }

    #[test]
    fn test_constant_folding() {
        let field = MatchExpr::eq("a", json!(1));
        assert_eq!(MatchExpr::and(vec![MatchExpr::always(), field.clone()]), field);
        assert_eq!(
            MatchExpr::and(vec![MatchExpr::literal(json!(false)), field.clone()]),
            MatchExpr::literal(json!(false))
        );
        assert!(MatchExpr::or(vec![field.clone(), MatchExpr::always()]).is_trivially_true());
        assert_eq!(MatchExpr::not(MatchExpr::always()).constant(), Some(false));
    }

    #[test]
    fn test_exists_and_regex() {
        let doc = json!({"title": "Rust in Action"});
        assert!(MatchExpr::Exists {
            field: "title".into(),
            exists: true
        }
        .matches(&doc));
        assert!(MatchExpr::Exists {
            field: "missing".into(),
            exists: false
        }
        .matches(&doc));
        assert!(MatchExpr::Regex {
            field: "title".into(),
            pattern: Pattern::new("^Rust").unwrap()
        }
        .matches(&doc));
        assert!(!MatchExpr::Regex {
            field: "title".into(),
            pattern: Pattern::new("^Go").unwrap()
        }
        .matches(&doc));
    }

    #[test]
    fn test_serializes_for_explain() {
        let expr = MatchExpr::eq("owner", json!("u1"));
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["compare"]["op"], "eq");
        assert_eq!(json["compare"]["left"]["field"], "owner");
    }

    #[test]
    fn test_regex_round_trips_as_source() {
        let expr = MatchExpr::Regex {
            field: "title".into(),
            pattern: Pattern::new("^Ru(st)?").unwrap(),
        };
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["regex"]["pattern"], "^Ru(st)?");

        let back: MatchExpr = serde_json::from_value(json).unwrap();
        assert_eq!(back, expr);
        assert!(back.matches(&json!({"title": "Rust"})));
    }

    #[test]
    fn test_invalid_regex_rejected_on_deserialize() {
        let result = serde_json::from_value::<MatchExpr>(json!({
            "regex": {"field": "title", "pattern": "("}
        }));
        assert!(result.is_err());
    }
}
