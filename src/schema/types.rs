//! Bucket schema type definitions
//!
//! Property kinds:
//! - string: UTF-8 string, optionally translatable
//! - number, boolean, date: scalars
//! - object: nested properties
//! - array: homogeneous items
//! - relation: reference to documents of another bucket

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::expression::{PropertyPath, Rule, DEFAULT_RULE};

use super::errors::{SchemaError, SchemaResult};

/// Property definitions keyed by name
pub type Properties = BTreeMap<String, PropertySpec>;

/// Cardinality of a relation property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationType {
    /// Stored as a single id; joins to one object or null
    #[serde(rename = "onetoone", alias = "OneToOne")]
    OneToOne,
    /// Stored as an array of ids; joins to an array of objects
    #[serde(rename = "onetomany", alias = "OneToMany")]
    OneToMany,
}

/// A property definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PropertySpec {
    String {
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        translatable: bool,
    },
    Number,
    Boolean,
    Date,
    Object {
        #[serde(default)]
        properties: Properties,
    },
    Array {
        items: Box<PropertySpec>,
    },
    Relation {
        #[serde(alias = "bucketId")]
        bucket_id: String,
        #[serde(alias = "relationType")]
        relation_type: RelationType,
    },
}

impl PropertySpec {
    pub fn string() -> Self {
        PropertySpec::String {
            translatable: false,
        }
    }

    pub fn translatable_string() -> Self {
        PropertySpec::String { translatable: true }
    }

    pub fn object(properties: Properties) -> Self {
        PropertySpec::Object { properties }
    }

    pub fn array(items: PropertySpec) -> Self {
        PropertySpec::Array {
            items: Box::new(items),
        }
    }

    pub fn one_to_one(bucket_id: impl Into<String>) -> Self {
        PropertySpec::Relation {
            bucket_id: bucket_id.into(),
            relation_type: RelationType::OneToOne,
        }
    }

    pub fn one_to_many(bucket_id: impl Into<String>) -> Self {
        PropertySpec::Relation {
            bucket_id: bucket_id.into(),
            relation_type: RelationType::OneToMany,
        }
    }

    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertySpec::String { .. } => "string",
            PropertySpec::Number => "number",
            PropertySpec::Boolean => "boolean",
            PropertySpec::Date => "date",
            PropertySpec::Object { .. } => "object",
            PropertySpec::Array { .. } => "array",
            PropertySpec::Relation { .. } => "relation",
        }
    }

    /// Target bucket and cardinality if this is a relation
    pub fn as_relation(&self) -> Option<(&str, RelationType)> {
        match self {
            PropertySpec::Relation {
                bucket_id,
                relation_type,
            } => Some((bucket_id, *relation_type)),
            _ => None,
        }
    }
}

/// Read/write access rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    #[serde(default = "default_rule")]
    pub read: String,
    #[serde(default = "default_rule")]
    pub write: String,
}

fn default_rule() -> String {
    DEFAULT_RULE.to_string()
}

impl Default for Acl {
    fn default() -> Self {
        Self {
            read: default_rule(),
            write: default_rule(),
        }
    }
}

/// What happens when an insert would exceed `count_limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitExceedBehaviour {
    /// Evict oldest documents first
    Remove,
    /// Reject the insert
    Prevent,
}

/// Per-bucket document settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSettings {
    #[serde(alias = "countLimit")]
    pub count_limit: u64,
    #[serde(alias = "limitExceedBehaviour")]
    pub limit_exceed_behaviour: LimitExceedBehaviour,
}

/// Complete bucket schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Bucket identifier
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub acl: Acl,
    #[serde(
        default,
        alias = "documentSettings",
        skip_serializing_if = "Option::is_none"
    )]
    pub document_settings: Option<DocumentSettings>,
}

impl Schema {
    /// Create a schema with allow-all rules
    pub fn new(id: impl Into<String>, properties: Properties) -> Self {
        Self {
            id: id.into(),
            title: None,
            properties,
            acl: Acl::default(),
            document_settings: None,
        }
    }

    pub fn with_acl(mut self, read: impl Into<String>, write: impl Into<String>) -> Self {
        self.acl = Acl {
            read: read.into(),
            write: write.into(),
        };
        self
    }

    pub fn with_document_settings(
        mut self,
        count_limit: u64,
        limit_exceed_behaviour: LimitExceedBehaviour,
    ) -> Self {
        self.document_settings = Some(DocumentSettings {
            count_limit,
            limit_exceed_behaviour,
        });
        self
    }

    /// True if any property at any object depth is a translatable string
    pub fn is_localizable(&self) -> bool {
        !self.translatable_paths().is_empty()
    }

    /// Paths of all translatable string properties
    pub fn translatable_paths(&self) -> Vec<PropertyPath> {
        let mut paths = Vec::new();
        collect_translatable(&self.properties, &mut Vec::new(), &mut paths);
        paths
    }

    /// Validates the schema structure itself (not a document)
    pub fn validate_structure(&self) -> SchemaResult<()> {
        if self.id.is_empty() {
            return Err(SchemaError::malformed("<empty>", "schema id must not be empty"));
        }

        for (name, rule) in [("read", &self.acl.read), ("write", &self.acl.write)] {
            Rule::parse(rule).map_err(|e| {
                SchemaError::malformed(&self.id, format!("acl.{} does not parse: {}", name, e))
            })?;
        }

        if let Some(settings) = &self.document_settings {
            if settings.count_limit == 0 {
                return Err(SchemaError::malformed(
                    &self.id,
                    "document_settings.count_limit must be > 0",
                ));
            }
        }

        validate_properties(&self.id, &self.properties)
    }
}

fn collect_translatable(properties: &Properties, prefix: &mut Vec<String>, out: &mut Vec<PropertyPath>) {
    for (name, spec) in properties {
        prefix.push(name.clone());
        match spec {
            PropertySpec::String { translatable: true } => out.push(prefix.clone()),
            PropertySpec::Object { properties } => collect_translatable(properties, prefix, out),
            _ => {}
        }
        prefix.pop();
    }
}

fn validate_properties(schema_id: &str, properties: &Properties) -> SchemaResult<()> {
    for (name, spec) in properties {
        match spec {
            PropertySpec::Relation { bucket_id, .. } if bucket_id.is_empty() => {
                return Err(SchemaError::malformed(
                    schema_id,
                    format!("relation '{}' has no target bucket", name),
                ));
            }
            PropertySpec::Object { properties } => validate_properties(schema_id, properties)?,
            PropertySpec::Array { items } => {
                if let PropertySpec::Object { properties } = items.as_ref() {
                    validate_properties(schema_id, properties)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}
