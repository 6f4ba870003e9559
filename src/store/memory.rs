//! In-memory document store
//!
//! Collections are `_id`-ordered maps behind a `RwLock`. Generated ids are
//! 24 hex digits from a monotonic counter, so ascending `_id` is insertion
//! order, which the count enforcer relies on for "oldest first".

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::expression::value::{equals, get_path, split_field};
use crate::pipeline::Stage;

use super::errors::{StoreError, StoreResult};
use super::executor::execute_stages;
use super::Store;

type Collection = BTreeMap<String, Value>;

/// In-memory store for tests and the CLI
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    unique_fields: RwLock<HashMap<String, Vec<String>>>,
    next_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style unique index
    pub fn with_unique_index(self, collection: &str, field: &str) -> Self {
        self.create_unique_index(collection, field);
        self
    }

    /// Declares `field` unique within `collection`. Null or missing values
    /// are not indexed.
    pub fn create_unique_index(&self, collection: &str, field: &str) {
        if let Ok(mut unique) = self.unique_fields.write() {
            let fields = unique.entry(collection.to_string()).or_default();
            if !fields.iter().any(|f| f == field) {
                fields.push(field.to_string());
            }
        }
    }

    /// Inserts documents as-is, generating ids only where missing
    pub fn seed(&self, collection: &str, documents: Vec<Value>) -> StoreResult<()> {
        for document in documents {
            self.insert(collection, document)?;
        }
        Ok(())
    }

    /// Snapshot of a collection in `_id` order
    pub fn documents(&self, collection: &str) -> StoreResult<Vec<Value>> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::backend(e.to_string()))?;
        Ok(collections
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    fn generate_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{:024x}", n)
    }

    fn check_unique(
        &self,
        collection: &str,
        existing: &Collection,
        candidate: &Value,
        own_id: &str,
    ) -> StoreResult<()> {
        let unique = self
            .unique_fields
            .read()
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let Some(fields) = unique.get(collection) else {
            return Ok(());
        };

        for field in fields {
            let path = split_field(field);
            let value = get_path(candidate, &path);
            if value.is_null() {
                continue;
            }
            let clash = existing
                .iter()
                .any(|(id, doc)| id != own_id && equals(&get_path(doc, &path), &value));
            if clash {
                return Err(StoreError::duplicate_key(field.clone()));
            }
        }
        Ok(())
    }

    fn aggregate_sync(&self, collection: &str, stages: &[Stage]) -> StoreResult<Vec<Value>> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::backend(e.to_string()))?;

        let documents = collections
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default();

        let find = |from: &str, id: &str| collections.get(from).and_then(|c| c.get(id)).cloned();
        Ok(execute_stages(stages, documents, &find))
    }

    fn count(&self, collection: &str) -> StoreResult<u64> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::backend(e.to_string()))?;
        Ok(collections.get(collection).map(|c| c.len() as u64).unwrap_or(0))
    }

    fn insert(&self, collection: &str, mut document: Value) -> StoreResult<Value> {
        let id = match document.get("_id") {
            None | Some(Value::Null) => self.generate_id(),
            Some(Value::String(id)) => id.clone(),
            Some(other) => {
                return Err(StoreError::invalid_document(format!(
                    "_id must be a string, got {}",
                    other
                )))
            }
        };

        let object = document
            .as_object_mut()
            .ok_or_else(|| StoreError::invalid_document("document must be an object"))?;
        object.insert("_id".to_string(), Value::String(id.clone()));

        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let target = collections.entry(collection.to_string()).or_default();

        if target.contains_key(&id) {
            return Err(StoreError::duplicate_key("_id"));
        }
        self.check_unique(collection, target, &document, &id)?;

        target.insert(id, document.clone());
        Ok(document)
    }

    fn replace(&self, collection: &str, id: &str, mut document: Value) -> StoreResult<Option<Value>> {
        let object = document
            .as_object_mut()
            .ok_or_else(|| StoreError::invalid_document("document must be an object"))?;
        object.insert("_id".to_string(), Value::String(id.to_string()));

        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let Some(target) = collections.get_mut(collection) else {
            return Ok(None);
        };
        if !target.contains_key(id) {
            return Ok(None);
        }
        self.check_unique(collection, target, &document, id)?;

        target.insert(id.to_string(), document.clone());
        Ok(Some(document))
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::backend(e.to_string()))?;
        Ok(collections
            .get_mut(collection)
            .map(|c| c.remove(id).is_some())
            .unwrap_or(false))
    }
}

impl Store for InMemoryStore {
    fn aggregate<'a>(
        &'a self,
        collection: &'a str,
        stages: &'a [Stage],
    ) -> BoxFuture<'a, StoreResult<Vec<Value>>> {
        Box::pin(async move { self.aggregate_sync(collection, stages) })
    }

    fn estimated_document_count<'a>(
        &'a self,
        collection: &'a str,
    ) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(async move { self.count(collection) })
    }

    fn insert_one<'a>(
        &'a self,
        collection: &'a str,
        document: Value,
    ) -> BoxFuture<'a, StoreResult<Value>> {
        Box::pin(async move { self.insert(collection, document) })
    }

    fn replace_one<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        document: Value,
    ) -> BoxFuture<'a, StoreResult<Option<Value>>> {
        Box::pin(async move { self.replace(collection, id, document) })
    }

    fn delete_one<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, StoreResult<bool>> {
        Box::pin(async move { self.delete(collection, id) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::MatchExpr;
    use serde_json::json;

    #[tokio::test]
    async fn test_generated_ids_follow_insertion_order() {
        let store = InMemoryStore::new();
        let a = store.insert_one("c", json!({"n": 1})).await.unwrap();
        let b = store.insert_one("c", json!({"n": 2})).await.unwrap();

        let (a_id, b_id) = (a["_id"].as_str().unwrap(), b["_id"].as_str().unwrap());
        assert_eq!(a_id.len(), 24);
        assert!(a_id < b_id);

        let docs = store.documents("c").unwrap();
        assert_eq!(docs[0]["n"], 1);
        assert_eq!(store.estimated_document_count("c").await.unwrap(), 2);
        assert_eq!(store.estimated_document_count("empty").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unique_index() {
        let store = InMemoryStore::new().with_unique_index("users", "email");
        store
            .insert_one("users", json!({"email": "a@x.io"}))
            .await
            .unwrap();
        store.insert_one("users", json!({})).await.unwrap();
        store.insert_one("users", json!({})).await.unwrap();

        let err = store
            .insert_one("users", json!({"email": "a@x.io"}))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::duplicate_key("email"));
    }

    #[tokio::test]
    async fn test_replace_keeps_id_and_ignores_own_unique_value() {
        let store = InMemoryStore::new().with_unique_index("users", "email");
        let doc = store
            .insert_one("users", json!({"email": "a@x.io", "n": 1}))
            .await
            .unwrap();
        let id = doc["_id"].as_str().unwrap();

        let replaced = store
            .replace_one("users", id, json!({"_id": "other", "email": "a@x.io", "n": 2}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(replaced["_id"], id);
        assert_eq!(replaced["n"], 2);

        assert_eq!(store.replace_one("users", "nope", json!({})).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_and_aggregate() {
        let store = InMemoryStore::new();
        store
            .seed("c", vec![json!({"_id": "a", "k": 1}), json!({"_id": "b", "k": 2})])
            .unwrap();

        assert!(store.delete_one("c", "a").await.unwrap());
        assert!(!store.delete_one("c", "a").await.unwrap());
        assert!(!store.delete_one("missing", "a").await.unwrap());

        let stages = vec![Stage::Match(MatchExpr::eq("k", json!(2)))];
        let out = store.aggregate("c", &stages).await.unwrap();
        assert_eq!(out, vec![json!({"_id": "b", "k": 2})]);
    }

    #[tokio::test]
    async fn test_rejects_non_object_documents() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.insert_one("c", json!([1, 2])).await,
            Err(StoreError::InvalidDocument(_))
        ));
        assert!(matches!(
            store.insert_one("c", json!({"_id": 5})).await,
            Err(StoreError::InvalidDocument(_))
        ));
    }
}
