//! Write-path guard
//!
//! Re-evaluates a bucket's write rule against the candidate document before
//! any mutation. Relations the rule reads through are resolved with a
//! single-document pipeline so the rule sees the same `{auth, document}`
//! shape as on the read path.

use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{materialize_auth, AuthResolver};
use crate::config::CompilerConfig;
use crate::error::{QueryError, QueryResult};
use crate::expression::{split_by_root, PropertyPath, Rule};
use crate::pipeline::Stage;
use crate::relation::{self, to_join_stages, JoinScope};
use crate::schema::{Schema, SchemaProvider};
use crate::store::Store;

/// The mutation being guarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOperation {
    Insert,
    Replace { id: String },
    Patch { id: String },
    Delete { id: String },
}

impl WriteOperation {
    pub fn name(&self) -> &'static str {
        match self {
            WriteOperation::Insert => "insert",
            WriteOperation::Replace { .. } => "replace",
            WriteOperation::Patch { .. } => "patch",
            WriteOperation::Delete { .. } => "delete",
        }
    }

    /// Target document id; inserts have none yet
    pub fn document_id(&self) -> Option<&str> {
        match self {
            WriteOperation::Insert => None,
            WriteOperation::Replace { id }
            | WriteOperation::Patch { id }
            | WriteOperation::Delete { id } => Some(id),
        }
    }
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Write rule enforcement
pub struct WriteGuard<'a> {
    provider: &'a dyn SchemaProvider,
    auth_resolver: &'a dyn AuthResolver,
    store: &'a dyn Store,
    config: &'a CompilerConfig,
}

impl<'a> WriteGuard<'a> {
    pub fn new(
        provider: &'a dyn SchemaProvider,
        auth_resolver: &'a dyn AuthResolver,
        store: &'a dyn Store,
        config: &'a CompilerConfig,
    ) -> Self {
        Self {
            provider,
            auth_resolver,
            store,
            config,
        }
    }

    /// Returns `Forbidden` unless the write rule holds for `candidate`.
    ///
    /// `candidate` is the document as it would be stored (for delete, the
    /// stored document). The allow-all rule short-circuits.
    pub async fn check(
        &self,
        schema: &Schema,
        operation: &WriteOperation,
        candidate: &Value,
        auth: &Value,
    ) -> QueryResult<()> {
        let rule = Rule::parse(&schema.acl.write)?;
        if rule.is_default() {
            return Ok(());
        }

        let (auth_paths, document_paths) = split_by_root(&rule.property_map());
        let auth = materialize_auth(
            self.auth_resolver,
            self.provider,
            self.config,
            auth,
            &auth_paths,
        )
        .await?;
        let document = self
            .resolve_candidate(schema, operation, candidate, &document_paths)
            .await?;

        if rule.run(&auth, &document) {
            debug!(bucket = %schema.id, operation = %operation, "Write rule passed");
            Ok(())
        } else {
            warn!(bucket = %schema.id, operation = %operation, "Write rule rejected mutation");
            Err(QueryError::forbidden(format!(
                "write rule denied {} on bucket '{}'",
                operation, schema.id
            )))
        }
    }

    /// Joins the relations the rule reads on the candidate. The candidate is
    /// fed to the store as a literal stream, so no stored document has to
    /// exist first. Inserts run against the bucket metadata collection.
    async fn resolve_candidate(
        &self,
        schema: &Schema,
        operation: &WriteOperation,
        candidate: &Value,
        document_paths: &[PropertyPath],
    ) -> QueryResult<Value> {
        let maps = relation::resolve(
            document_paths,
            &schema.properties,
            self.provider,
            JoinScope::Predicate,
            self.config.max_relation_depth,
        )
        .await?;
        if maps.is_empty() {
            return Ok(candidate.clone());
        }

        let collection = match operation {
            WriteOperation::Insert => self.config.bucket_collection.clone(),
            _ => self.config.data_collection(&schema.id),
        };

        let mut pipeline = vec![Stage::Documents(vec![candidate.clone()])];
        pipeline.extend(to_join_stages(&maps, None, self.config));

        let resolved = self.store.aggregate(&collection, &pipeline).await?;
        resolved.into_iter().next().ok_or_else(|| {
            QueryError::store(format!(
                "candidate resolution on '{}' returned no document",
                collection
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticAuthResolver;
    use crate::schema::{InMemorySchemaProvider, Properties, PropertySpec};
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn schema(write: &str) -> Schema {
        let mut props = Properties::new();
        props.insert("owner".into(), PropertySpec::string());
        props.insert("team".into(), PropertySpec::one_to_one("teams"));
        Schema::new("notes", props).with_acl("true==true", write)
    }

    fn provider() -> InMemorySchemaProvider {
        let mut teams = Properties::new();
        teams.insert("members".into(), PropertySpec::array(PropertySpec::string()));
        InMemorySchemaProvider::new().with_schema(Schema::new("teams", teams))
    }

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .seed("buckets", vec![json!({"_id": "notes"})])
            .unwrap();
        store
            .seed("bucket_teams", vec![json!({"_id": "t1", "members": ["u1", "u2"]})])
            .unwrap();
        store
            .seed("bucket_notes", vec![json!({"_id": "n1", "owner": "u1", "team": "t1"})])
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_owner_rule() {
        let (provider, store, config) = (provider(), store(), CompilerConfig::default());
        let resolver = StaticAuthResolver::default();
        let guard = WriteGuard::new(&provider, &resolver, &store, &config);
        let schema = schema("document.owner == auth._id");

        let candidate = json!({"owner": "u1"});
        assert!(guard
            .check(&schema, &WriteOperation::Insert, &candidate, &json!({"_id": "u1"}))
            .await
            .is_ok());

        let err = guard
            .check(&schema, &WriteOperation::Insert, &candidate, &json!({"_id": "u2"}))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_insert_resolves_relations_against_bucket_metadata() {
        let (provider, store, config) = (provider(), store(), CompilerConfig::default());
        let resolver = StaticAuthResolver::default();
        let guard = WriteGuard::new(&provider, &resolver, &store, &config);
        let schema = schema("document.team.members has auth._id");

        let candidate = json!({"owner": "u2", "team": "t1"});
        assert!(guard
            .check(&schema, &WriteOperation::Insert, &candidate, &json!({"_id": "u2"}))
            .await
            .is_ok());
        assert!(guard
            .check(&schema, &WriteOperation::Insert, &candidate, &json!({"_id": "u3"}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_insert_without_bucket_metadata_row() {
        let (provider, config) = (provider(), CompilerConfig::default());
        let store = InMemoryStore::new();
        store
            .seed("bucket_teams", vec![json!({"_id": "t1", "members": ["u1"]})])
            .unwrap();
        let resolver = StaticAuthResolver::default();
        let guard = WriteGuard::new(&provider, &resolver, &store, &config);
        let schema = schema("document.team.members has auth._id");

        let candidate = json!({"owner": "u1", "team": "t1"});
        assert!(guard
            .check(&schema, &WriteOperation::Insert, &candidate, &json!({"_id": "u1"}))
            .await
            .is_ok());
        assert!(store.documents("buckets").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_resolves_against_data_collection() {
        let (provider, store, config) = (provider(), store(), CompilerConfig::default());
        let resolver = StaticAuthResolver::default();
        let guard = WriteGuard::new(&provider, &resolver, &store, &config);
        let schema = schema("document.team.members has auth._id");

        let operation = WriteOperation::Replace { id: "n1".into() };
        let candidate = json!({"_id": "n1", "owner": "u1", "team": "t1"});
        assert!(guard
            .check(&schema, &operation, &candidate, &json!({"_id": "u1"}))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_default_rule_allows_and_bad_rule_fails() {
        let (provider, store, config) = (provider(), store(), CompilerConfig::default());
        let resolver = StaticAuthResolver::default();
        let guard = WriteGuard::new(&provider, &resolver, &store, &config);

        assert!(guard
            .check(&schema("true == true"), &WriteOperation::Insert, &json!({}), &json!({}))
            .await
            .is_ok());

        let err = guard
            .check(&schema("document.owner =="), &WriteOperation::Insert, &json!({}), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::AclSyntax(_)));
    }
}
