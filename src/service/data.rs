//! Bucket data service
//!
//! Orchestrates a request end to end: schema lookup, pipeline compilation
//! and execution for reads; guard, count enforcement and the store write for
//! mutations. Each public call runs in a tracing span carrying a request id.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::auth::AuthResolver;
use crate::config::CompilerConfig;
use crate::error::{QueryError, QueryResult};
use crate::expression::MatchExpr;
use crate::guard::{CountEnforcer, WriteGuard, WriteOperation};
use crate::pipeline::{normalize_paginated, FindRequest, PipelineBuilder, Stage, TOTAL_FIELD};
use crate::schema::{Schema, SchemaProvider};
use crate::store::Store;

use super::patch::merge_patch;

/// Pagination metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub total: u64,
}

/// Result of a find request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FindResult {
    Paginated { meta: Meta, data: Vec<Value> },
    List(Vec<Value>),
}

impl FindResult {
    /// Returned documents, regardless of shape
    pub fn data(&self) -> &[Value] {
        match self {
            FindResult::Paginated { data, .. } => data,
            FindResult::List(data) => data,
        }
    }

    pub fn total(&self) -> Option<u64> {
        match self {
            FindResult::Paginated { meta, .. } => Some(meta.total),
            FindResult::List(_) => None,
        }
    }
}

/// Access-controlled reads and writes over bucket data
pub struct BucketDataService {
    provider: Arc<dyn SchemaProvider>,
    auth_resolver: Arc<dyn AuthResolver>,
    store: Arc<dyn Store>,
    config: CompilerConfig,
}

impl BucketDataService {
    pub fn new(
        provider: Arc<dyn SchemaProvider>,
        auth_resolver: Arc<dyn AuthResolver>,
        store: Arc<dyn Store>,
        config: CompilerConfig,
    ) -> Self {
        Self {
            provider,
            auth_resolver,
            store,
            config,
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compiles the read pipeline for `request` without running it
    pub async fn compile(
        &self,
        bucket_id: &str,
        request: &FindRequest,
        auth: &Value,
    ) -> QueryResult<Vec<Stage>> {
        let schema = self.provider.resolve(bucket_id).await?;
        self.compile_for(&schema, request, auth).await
    }

    /// Runs a find request
    #[instrument(skip(self, request, auth), fields(request_id = %Uuid::new_v4()))]
    pub async fn find(
        &self,
        bucket_id: &str,
        request: &FindRequest,
        auth: &Value,
    ) -> QueryResult<FindResult> {
        let schema = self.provider.resolve(bucket_id).await?;
        let stages = self.compile_for(&schema, request, auth).await?;
        let collection = self.config.data_collection(&schema.id);
        let results = self.store.aggregate(&collection, &stages).await?;

        let result = if request.paginate {
            paginated_result(normalize_paginated(results))
        } else {
            FindResult::List(results)
        };
        debug!(returned = result.data().len(), total = ?result.total(), "Find completed");
        Ok(result)
    }

    /// Finds one document through the read pipeline; `None` when it does
    /// not exist or the read rule hides it
    pub async fn find_by_id(
        &self,
        bucket_id: &str,
        id: &str,
        request: &FindRequest,
        auth: &Value,
    ) -> QueryResult<Option<Value>> {
        let request = FindRequest {
            document_id: Some(id.to_string()),
            paginate: false,
            skip: None,
            limit: Some(1),
            ..request.clone()
        };
        match self.find(bucket_id, &request, auth).await? {
            FindResult::List(documents) => Ok(documents.into_iter().next()),
            FindResult::Paginated { data, .. } => Ok(data.into_iter().next()),
        }
    }

    /// Inserts a document; returns it with its `_id`
    #[instrument(skip(self, document, auth), fields(request_id = %Uuid::new_v4()))]
    pub async fn insert(&self, bucket_id: &str, document: Value, auth: &Value) -> QueryResult<Value> {
        if !document.is_object() {
            return Err(QueryError::invalid_request("document must be an object"));
        }
        let schema = self.provider.resolve(bucket_id).await?;

        self.guard()
            .check(&schema, &WriteOperation::Insert, &document, auth)
            .await?;
        CountEnforcer::new(self.store.as_ref(), &self.config)
            .enforce(&schema)
            .await?;

        let collection = self.config.data_collection(&schema.id);
        let stored = self.store.insert_one(&collection, document).await?;
        info!(id = %stored["_id"], "Inserted document");
        Ok(stored)
    }

    /// Replaces a document; `None` when it does not exist
    #[instrument(skip(self, document, auth), fields(request_id = %Uuid::new_v4()))]
    pub async fn replace(
        &self,
        bucket_id: &str,
        id: &str,
        document: Value,
        auth: &Value,
    ) -> QueryResult<Option<Value>> {
        let mut candidate = document;
        let Some(object) = candidate.as_object_mut() else {
            return Err(QueryError::invalid_request("document must be an object"));
        };
        object.insert("_id".to_string(), json!(id));

        let schema = self.provider.resolve(bucket_id).await?;
        if self.fetch(&schema, id).await?.is_none() {
            return Ok(None);
        }

        let operation = WriteOperation::Replace { id: id.to_string() };
        self.guard().check(&schema, &operation, &candidate, auth).await?;
        self.store_replace(&schema, id, candidate).await
    }

    /// Applies a JSON merge patch; `None` when the document does not exist
    #[instrument(skip(self, patch, auth), fields(request_id = %Uuid::new_v4()))]
    pub async fn patch(
        &self,
        bucket_id: &str,
        id: &str,
        patch: &Value,
        auth: &Value,
    ) -> QueryResult<Option<Value>> {
        if !patch.is_object() {
            return Err(QueryError::invalid_request("patch must be an object"));
        }
        let schema = self.provider.resolve(bucket_id).await?;
        let Some(mut candidate) = self.fetch(&schema, id).await? else {
            return Ok(None);
        };
        merge_patch(&mut candidate, patch);
        if let Some(object) = candidate.as_object_mut() {
            object.insert("_id".to_string(), json!(id));
        }

        let operation = WriteOperation::Patch { id: id.to_string() };
        self.guard().check(&schema, &operation, &candidate, auth).await?;
        self.store_replace(&schema, id, candidate).await
    }

    /// Deletes a document; false when it does not exist
    #[instrument(skip(self, auth), fields(request_id = %Uuid::new_v4()))]
    pub async fn delete(&self, bucket_id: &str, id: &str, auth: &Value) -> QueryResult<bool> {
        let schema = self.provider.resolve(bucket_id).await?;
        let Some(existing) = self.fetch(&schema, id).await? else {
            return Ok(false);
        };

        let operation = WriteOperation::Delete { id: id.to_string() };
        self.guard().check(&schema, &operation, &existing, auth).await?;

        let collection = self.config.data_collection(&schema.id);
        let deleted = self.store.delete_one(&collection, id).await?;
        info!(deleted, "Deleted document");
        Ok(deleted)
    }

    fn guard(&self) -> WriteGuard<'_> {
        WriteGuard::new(
            self.provider.as_ref(),
            self.auth_resolver.as_ref(),
            self.store.as_ref(),
            &self.config,
        )
    }

    async fn compile_for(
        &self,
        schema: &Schema,
        request: &FindRequest,
        auth: &Value,
    ) -> QueryResult<Vec<Stage>> {
        let builder = PipelineBuilder::new(
            schema,
            self.provider.as_ref(),
            self.auth_resolver.as_ref(),
            &self.config,
        )
        .request_relations(request.relation_paths.clone())
        .find_one_if_requested(request.document_id.as_deref())
        .filter_resources(request.resource_filter.clone())
        .localize(request.language.as_deref(), request.localize)
        .apply_read_rule(auth)
        .await?
        .reset_non_overlapping_relations()
        .apply_user_filter(request.filter.as_ref(), auth)
        .await?
        .resolve_output_relations()
        .await?
        .sort(request.sort.clone())
        .skip(request.skip)
        .limit(request.limit)
        .project(request.project_map.clone());

        let estimated_total = if request.paginate && !builder.needs_exact_count() {
            let collection = self.config.data_collection(&schema.id);
            Some(self.store.estimated_document_count(&collection).await?)
        } else {
            None
        };

        Ok(builder.paginate(request.paginate, estimated_total).build())
    }

    async fn fetch(&self, schema: &Schema, id: &str) -> QueryResult<Option<Value>> {
        let collection = self.config.data_collection(&schema.id);
        let stages = vec![Stage::Match(MatchExpr::eq("_id", json!(id))), Stage::Limit(1)];
        let found = self.store.aggregate(&collection, &stages).await?;
        Ok(found.into_iter().next())
    }

    async fn store_replace(
        &self,
        schema: &Schema,
        id: &str,
        candidate: Value,
    ) -> QueryResult<Option<Value>> {
        let collection = self.config.data_collection(&schema.id);
        let replaced = self.store.replace_one(&collection, id, candidate).await?;
        if replaced.is_some() {
            info!("Replaced document");
        }
        Ok(replaced)
    }
}

fn paginated_result(normalized: Value) -> FindResult {
    let total = normalized["meta"][TOTAL_FIELD].as_u64().unwrap_or(0);
    let data = match normalized.get("data") {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    FindResult::Paginated {
        meta: Meta { total },
        data,
    }
}
