//! Bucket schemas
//!
//! A bucket schema declares typed properties (including relations to other
//! buckets), an ACL rule pair and optional document settings. Schemas are
//! immutable for the duration of a request and fetched through an injected
//! `SchemaProvider`.

mod errors;
mod provider;
mod types;

pub use errors::{SchemaError, SchemaResult};
pub use provider::{InMemorySchemaProvider, SchemaProvider};
pub use types::{
    Acl, DocumentSettings, LimitExceedBehaviour, Properties, PropertySpec, RelationType, Schema,
};
