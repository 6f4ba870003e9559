//! Document count enforcement
//!
//! Runs before an insert into a bucket with `document_settings`. With
//! `remove` the oldest documents (ascending `_id`) are evicted to make room;
//! with `prevent` the insert is rejected. Neither is atomic with the insert,
//! so concurrent inserts can briefly exceed the limit; repeated inserts
//! converge back to it.

use serde_json::Value;
use tracing::{debug, info};

use crate::config::CompilerConfig;
use crate::error::{QueryError, QueryResult};
use crate::pipeline::{SortSpec, Stage};
use crate::schema::{LimitExceedBehaviour, Schema};
use crate::store::Store;

/// Enforces per-bucket document limits
pub struct CountEnforcer<'a> {
    store: &'a dyn Store,
    config: &'a CompilerConfig,
}

impl<'a> CountEnforcer<'a> {
    pub fn new(store: &'a dyn Store, config: &'a CompilerConfig) -> Self {
        Self { store, config }
    }

    /// Makes room for one more document. Returns the number evicted.
    pub async fn enforce(&self, schema: &Schema) -> QueryResult<u64> {
        let Some(settings) = &schema.document_settings else {
            return Ok(0);
        };

        let collection = self.config.data_collection(&schema.id);
        let estimated = self.store.estimated_document_count(&collection).await?;

        match settings.limit_exceed_behaviour {
            LimitExceedBehaviour::Prevent => {
                if estimated >= settings.count_limit {
                    debug!(
                        bucket = %schema.id,
                        estimated,
                        limit = settings.count_limit,
                        "Document limit reached, insert prevented"
                    );
                    return Err(QueryError::DocumentLimitExceeded {
                        limit: settings.count_limit,
                    });
                }
                Ok(0)
            }
            LimitExceedBehaviour::Remove => {
                let diff = (estimated + 1).saturating_sub(settings.count_limit);
                let mut evicted = 0;
                for _ in 0..diff {
                    if !self.evict_oldest(&collection).await? {
                        break;
                    }
                    evicted += 1;
                }
                if evicted > 0 {
                    info!(
                        bucket = %schema.id,
                        evicted,
                        limit = settings.count_limit,
                        "Evicted oldest documents"
                    );
                }
                Ok(evicted)
            }
        }
    }

    async fn evict_oldest(&self, collection: &str) -> QueryResult<bool> {
        let oldest = vec![Stage::Sort(vec![SortSpec::asc("_id")]), Stage::Limit(1)];
        let found = self.store.aggregate(collection, &oldest).await?;

        let Some(id) = found
            .first()
            .and_then(|doc| doc.get("_id"))
            .and_then(Value::as_str)
        else {
            return Ok(false);
        };
        Ok(self.store.delete_one(collection, id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Properties;
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn bucket(limit: u64, behaviour: LimitExceedBehaviour) -> Schema {
        Schema::new("logs", Properties::new()).with_document_settings(limit, behaviour)
    }

    #[tokio::test]
    async fn test_remove_evicts_oldest() {
        let store = InMemoryStore::new();
        let config = CompilerConfig::default();
        for n in 0..3 {
            store.insert_one("bucket_logs", json!({ "n": n })).await.unwrap();
        }

        let enforcer = CountEnforcer::new(&store, &config);
        let evicted = enforcer
            .enforce(&bucket(2, LimitExceedBehaviour::Remove))
            .await
            .unwrap();
        assert_eq!(evicted, 2);

        let left = store.documents("bucket_logs").unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0]["n"], 2);
    }

    #[tokio::test]
    async fn test_prevent_rejects_at_limit() {
        let store = InMemoryStore::new();
        let config = CompilerConfig::default();
        store.insert_one("bucket_logs", json!({})).await.unwrap();

        let enforcer = CountEnforcer::new(&store, &config);
        let err = enforcer
            .enforce(&bucket(1, LimitExceedBehaviour::Prevent))
            .await
            .unwrap_err();
        assert_eq!(err, QueryError::DocumentLimitExceeded { limit: 1 });
        assert_eq!(store.documents("bucket_logs").unwrap().len(), 1);

        assert_eq!(
            enforcer
                .enforce(&bucket(2, LimitExceedBehaviour::Prevent))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_no_settings_is_noop() {
        let store = InMemoryStore::new();
        let config = CompilerConfig::default();
        let enforcer = CountEnforcer::new(&store, &config);
        let schema = Schema::new("logs", Properties::new());
        assert_eq!(enforcer.enforce(&schema).await.unwrap(), 0);
    }
}
