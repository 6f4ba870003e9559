//! Structured (object) filters
//!
//! Translates a request filter object such as
//! `{"status": "archived", "author.age": {"$gte": 18}}` into a store fragment
//! and the document paths it references.
//!
//! Supported operators: `$eq $ne $gt $gte $lt $lte $in $nin $exists $regex
//! $not` on fields, `$and $or` at any object level.

use serde_json::{Map, Value};

use super::ast::{CompareOp, PropertyPath, Root};
use super::errors::{ExpressionError, ExpressionResult};
use super::fragment::{MatchExpr, Pattern};

/// A translated structured filter
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredFilter {
    pub fragment: MatchExpr,
    /// Referenced paths, rooted at `document`
    pub paths: Vec<PropertyPath>,
}

/// Translates a filter object
pub fn translate(filter: &Value) -> ExpressionResult<StructuredFilter> {
    let object = filter
        .as_object()
        .ok_or_else(|| ExpressionError::InvalidFilter("filter must be an object".into()))?;

    let mut paths = Vec::new();
    let fragment = translate_object(object, &mut paths)?;
    Ok(StructuredFilter { fragment, paths })
}

fn translate_object(
    object: &Map<String, Value>,
    paths: &mut Vec<PropertyPath>,
) -> ExpressionResult<MatchExpr> {
    let mut clauses = Vec::with_capacity(object.len());

    for (key, value) in object {
        let clause = match key.as_str() {
            "$and" | "$or" => {
                let items = value.as_array().ok_or_else(|| {
                    ExpressionError::InvalidFilter(format!("{} expects an array", key))
                })?;
                let mut translated = Vec::with_capacity(items.len());
                for item in items {
                    let obj = item.as_object().ok_or_else(|| {
                        ExpressionError::InvalidFilter(format!("{} items must be objects", key))
                    })?;
                    translated.push(translate_object(obj, paths)?);
                }
                if key == "$and" {
                    MatchExpr::and(translated)
                } else {
                    MatchExpr::or(translated)
                }
            }
            op if op.starts_with('$') => {
                return Err(ExpressionError::InvalidFilter(format!(
                    "unsupported top-level operator {}",
                    op
                )));
            }
            field => {
                record_path(field, paths);
                translate_field(field, value)?
            }
        };
        clauses.push(clause);
    }

    Ok(MatchExpr::and(clauses))
}

fn record_path(field: &str, paths: &mut Vec<PropertyPath>) {
    let mut path = vec![Root::Document.as_str().to_string()];
    path.extend(field.split('.').map(str::to_string));
    if !paths.contains(&path) {
        paths.push(path);
    }
}

fn is_operator_object(value: &Value) -> Option<&Map<String, Value>> {
    value
        .as_object()
        .filter(|obj| !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')))
}

fn translate_field(field: &str, value: &Value) -> ExpressionResult<MatchExpr> {
    let Some(operators) = is_operator_object(value) else {
        return Ok(MatchExpr::eq(field, value.clone()));
    };

    let mut clauses = Vec::with_capacity(operators.len());
    for (op, operand) in operators {
        let compare = |op: CompareOp| {
            MatchExpr::compare(op, MatchExpr::field(field), MatchExpr::literal(operand.clone()))
        };
        let clause = match op.as_str() {
            "$eq" => compare(CompareOp::Eq),
            "$ne" => compare(CompareOp::Ne),
            "$gt" => compare(CompareOp::Gt),
            "$gte" => compare(CompareOp::Gte),
            "$lt" => compare(CompareOp::Lt),
            "$lte" => compare(CompareOp::Lte),
            "$in" | "$nin" => {
                if !operand.is_array() {
                    return Err(ExpressionError::InvalidFilter(format!(
                        "{} on '{}' expects an array",
                        op, field
                    )));
                }
                let membership = MatchExpr::compare(
                    CompareOp::Has,
                    MatchExpr::literal(operand.clone()),
                    MatchExpr::field(field),
                );
                if op == "$in" {
                    membership
                } else {
                    MatchExpr::not(membership)
                }
            }
            "$exists" => MatchExpr::Exists {
                field: field.to_string(),
                exists: operand.as_bool().ok_or_else(|| {
                    ExpressionError::InvalidFilter(format!("$exists on '{}' expects a boolean", field))
                })?,
            },
            "$regex" => {
                let pattern = operand.as_str().ok_or_else(|| {
                    ExpressionError::InvalidFilter(format!("$regex on '{}' expects a string", field))
                })?;
                let pattern = Pattern::new(pattern).map_err(|e| {
                    ExpressionError::InvalidFilter(format!("invalid $regex on '{}': {}", field, e))
                })?;
                MatchExpr::Regex {
                    field: field.to_string(),
                    pattern,
                }
            }
            "$not" => MatchExpr::not(translate_field(field, operand)?),
            other => {
                return Err(ExpressionError::InvalidFilter(format!(
                    "unsupported operator {} on '{}'",
                    other, field
                )));
            }
        };
        clauses.push(clause);
    }

    Ok(MatchExpr::and(clauses))
}
