//! Aggregation pipeline stages
//!
//! Stages are opaque to the builder: it only orders and concatenates them.
//! The store gives them their match/lookup/project/sort/facet semantics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expression::{MatchExpr, PropertyPath};
use crate::locale::Locale;
use crate::schema::RelationType;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Sort specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    /// Dotted field path
    pub field: String,
    #[serde(default = "default_direction")]
    pub direction: SortDirection,
}

fn default_direction() -> SortDirection {
    SortDirection::Asc
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Cross-collection join replacing references at `path` with the
/// referenced documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lookup {
    /// Absolute path of the relation property in the input document
    pub path: PropertyPath,
    /// Collection holding the referenced documents
    pub from: String,
    /// One-to-one flattens to an object or null; one-to-many keeps an array
    pub relation_type: RelationType,
    /// Stages applied to each joined document
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipeline: Vec<Stage>,
    /// Keep the stored reference beside the joined value so a later `Reset`
    /// restores it exactly, dangling ids included
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub keep_reference: bool,
}

/// One pipeline instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Keep documents for which the predicate holds
    Match(MatchExpr),
    Lookup(Lookup),
    /// Turn a joined relation back into its reference form (`_id` or ids)
    Reset {
        path: PropertyPath,
        relation_type: RelationType,
    },
    /// Replace translation maps at `paths` with the best/fallback entry
    Localize {
        paths: Vec<PropertyPath>,
        locale: Locale,
    },
    /// Replace every input document with a literal value
    ReplaceWith(Value),
    /// Replace the whole input stream with literal documents
    Documents(Vec<Value>),
    /// Inclusion projection; `_id` is always kept
    Project(Vec<PropertyPath>),
    Sort(Vec<SortSpec>),
    Skip(u64),
    Limit(u64),
    /// Collapse the stream into `{field: n}`; an empty stream yields nothing
    Count { field: String },
    /// Run independent sub-pipelines over the same input
    Facet(BTreeMap<String, Vec<Stage>>),
}

impl Stage {
    /// Stage name for logs and explain output
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "match",
            Stage::Lookup(_) => "lookup",
            Stage::Reset { .. } => "reset",
            Stage::Localize { .. } => "localize",
            Stage::ReplaceWith(_) => "replace_with",
            Stage::Documents(_) => "documents",
            Stage::Project(_) => "project",
            Stage::Sort(_) => "sort",
            Stage::Skip(_) => "skip",
            Stage::Limit(_) => "limit",
            Stage::Count { .. } => "count",
            Stage::Facet(_) => "facet",
        }
    }
}

/// Stage names, for assertions and logging
pub fn stage_names(stages: &[Stage]) -> Vec<&'static str> {
    stages.iter().map(Stage::name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_serialization() {
        let stage = Stage::Lookup(Lookup {
            path: vec!["author".into()],
            from: "bucket_people".into(),
            relation_type: RelationType::OneToOne,
            pipeline: vec![],
            keep_reference: false,
        });
        let json = serde_json::to_value(&stage).unwrap();
        assert_eq!(json["lookup"]["from"], "bucket_people");
        assert_eq!(json["lookup"]["relation_type"], "onetoone");
        assert!(json["lookup"].get("pipeline").is_none());
        assert!(json["lookup"].get("keep_reference").is_none());

        let back: Stage = serde_json::from_value(json).unwrap();
        assert_eq!(back, stage);
    }

    #[test]
    fn test_sort_spec_default_direction() {
        let spec: SortSpec = serde_json::from_value(json!({"field": "title"})).unwrap();
        assert_eq!(spec, SortSpec::asc("title"));
        assert_eq!(SortSpec::desc("x").direction.as_str(), "desc");
    }

    #[test]
    fn test_stage_names() {
        let stages = vec![Stage::Skip(1), Stage::Limit(2), Stage::Match(MatchExpr::always())];
        assert_eq!(stage_names(&stages), vec!["skip", "limit", "match"]);
    }
}
