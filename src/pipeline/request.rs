//! Caller find request

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::expression::{MatchExpr, PropertyPath};

use super::stage::SortSpec;

/// User filter: rule-language text or a structured object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Filter {
    Expression(String),
    Object(Map<String, Value>),
}

/// Parameters of one find request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindRequest {
    /// Opaque scoping predicate supplied by an outer layer
    #[serde(default, alias = "resourceFilter")]
    pub resource_filter: Option<MatchExpr>,

    /// Restrict the result to one document
    #[serde(default, alias = "documentId")]
    pub document_id: Option<String>,

    #[serde(default)]
    pub filter: Option<Filter>,

    /// Requested language; a tag or an Accept-Language list
    #[serde(default)]
    pub language: Option<String>,

    /// Replace translation maps with the resolved language (default: true)
    #[serde(default = "default_localize")]
    pub localize: bool,

    /// Relations to return in object form
    #[serde(default, alias = "relationPaths")]
    pub relation_paths: Vec<PropertyPath>,

    #[serde(default)]
    pub sort: Vec<SortSpec>,

    #[serde(default)]
    pub skip: Option<u64>,

    #[serde(default)]
    pub limit: Option<u64>,

    /// Inclusion projection; empty keeps every field
    #[serde(default, alias = "projectMap")]
    pub project_map: Vec<PropertyPath>,

    /// Wrap the result as `{meta: {total}, data}`
    #[serde(default)]
    pub paginate: bool,
}

fn default_localize() -> bool {
    true
}

impl Default for FindRequest {
    fn default() -> Self {
        Self {
            resource_filter: None,
            document_id: None,
            filter: None,
            language: None,
            localize: default_localize(),
            relation_paths: Vec::new(),
            sort: Vec::new(),
            skip: None,
            limit: None,
            project_map: Vec::new(),
            paginate: false,
        }
    }
}

impl FindRequest {
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_relations(mut self, paths: Vec<PropertyPath>) -> Self {
        self.relation_paths = paths;
        self
    }

    pub fn paginated(mut self) -> Self {
        self.paginate = true;
        self
    }
}
