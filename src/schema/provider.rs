//! Schema provider
//!
//! The compiler fetches bucket schemas through `SchemaProvider` on every
//! request; nothing is cached across requests because schemas may change.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use futures_util::future::BoxFuture;

use super::errors::{SchemaError, SchemaResult};
use super::types::Schema;

/// Async schema lookup by bucket id
pub trait SchemaProvider: Send + Sync {
    fn resolve<'a>(&'a self, id: &'a str) -> BoxFuture<'a, SchemaResult<Schema>>;
}

impl<T: SchemaProvider + ?Sized> SchemaProvider for Arc<T> {
    fn resolve<'a>(&'a self, id: &'a str) -> BoxFuture<'a, SchemaResult<Schema>> {
        (**self).resolve(id)
    }
}

/// In-memory schema registry
#[derive(Debug, Default)]
pub struct InMemorySchemaProvider {
    schemas: RwLock<HashMap<String, Schema>>,
}

impl InMemorySchemaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn with_schema(self, schema: Schema) -> Self {
        self.register(schema);
        self
    }

    /// Registers or replaces a schema
    pub fn register(&self, schema: Schema) {
        if let Ok(mut schemas) = self.schemas.write() {
            schemas.insert(schema.id.clone(), schema);
        }
    }

    /// Loads a JSON file containing an array of bucket schemas.
    ///
    /// Every schema is structurally validated; the first invalid one aborts
    /// the load.
    pub fn load_file(path: &Path) -> SchemaResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::unavailable(format!("failed to read {}: {}", path.display(), e))
        })?;

        let schemas: Vec<Schema> = serde_json::from_str(&content).map_err(|e| {
            SchemaError::unavailable(format!("invalid schema JSON in {}: {}", path.display(), e))
        })?;

        let provider = Self::new();
        for schema in schemas {
            schema.validate_structure()?;
            provider.register(schema);
        }
        Ok(provider)
    }

    /// Snapshot of all registered schemas, ordered by id
    pub fn schemas(&self) -> Vec<Schema> {
        let mut all: Vec<Schema> = self
            .schemas
            .read()
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

impl SchemaProvider for InMemorySchemaProvider {
    fn resolve<'a>(&'a self, id: &'a str) -> BoxFuture<'a, SchemaResult<Schema>> {
        Box::pin(async move {
            let schemas = self
                .schemas
                .read()
                .map_err(|e| SchemaError::unavailable(e.to_string()))?;
            schemas
                .get(id)
                .cloned()
                .ok_or_else(|| SchemaError::not_found(id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{Properties, PropertySpec};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_resolve_registered_and_missing() {
        let provider =
            InMemorySchemaProvider::new().with_schema(Schema::new("posts", Properties::new()));

        assert_eq!(provider.resolve("posts").await.unwrap().id, "posts");
        assert_eq!(
            provider.resolve("nope").await,
            Err(SchemaError::not_found("nope"))
        );
    }

    #[tokio::test]
    async fn test_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"_id": "people", "properties": {{"name": {{"type": "string"}}}}}},
                {{"_id": "posts", "properties": {{"author": {{"type": "relation", "bucketId": "people", "relationType": "onetoone"}}}}}}]"#
        )
        .unwrap();

        let provider = InMemorySchemaProvider::load_file(file.path()).unwrap();
        let posts = provider.resolve("posts").await.unwrap();
        assert_eq!(posts.properties["author"], PropertySpec::one_to_one("people"));
        assert_eq!(provider.schemas().len(), 2);
    }

    #[test]
    fn test_load_file_rejects_invalid_rule() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"[{{"_id": "x", "acl": {{"read": "((", "write": "true==true"}}}}]"#).unwrap();

        assert!(matches!(
            InMemorySchemaProvider::load_file(file.path()),
            Err(SchemaError::Malformed { .. })
        ));
    }
}
