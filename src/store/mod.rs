//! Document store abstraction
//!
//! The compiler only needs a store that executes a stage list against a
//! collection, reports an estimated document count and performs single
//! document writes. `InMemoryStore` is the reference implementation used by
//! tests and the CLI.

mod errors;
mod executor;
mod memory;

pub use errors::{StoreError, StoreResult};
pub use executor::execute_stages;
pub use memory::InMemoryStore;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::pipeline::Stage;

/// Aggregation-capable document store
pub trait Store: Send + Sync {
    /// Runs `stages` over every document of `collection`
    fn aggregate<'a>(
        &'a self,
        collection: &'a str,
        stages: &'a [Stage],
    ) -> BoxFuture<'a, StoreResult<Vec<Value>>>;

    /// Cheap, possibly stale, document count
    fn estimated_document_count<'a>(&'a self, collection: &'a str)
        -> BoxFuture<'a, StoreResult<u64>>;

    /// Inserts a document, assigning `_id` when absent; returns the stored document
    fn insert_one<'a>(
        &'a self,
        collection: &'a str,
        document: Value,
    ) -> BoxFuture<'a, StoreResult<Value>>;

    /// Replaces the document with `id`; `None` when it does not exist
    fn replace_one<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        document: Value,
    ) -> BoxFuture<'a, StoreResult<Option<Value>>>;

    /// Deletes the document with `id`; false when it does not exist
    fn delete_one<'a>(&'a self, collection: &'a str, id: &'a str)
        -> BoxFuture<'a, StoreResult<bool>>;
}

impl<T: Store + ?Sized> Store for Arc<T> {
    fn aggregate<'a>(
        &'a self,
        collection: &'a str,
        stages: &'a [Stage],
    ) -> BoxFuture<'a, StoreResult<Vec<Value>>> {
        (**self).aggregate(collection, stages)
    }

    fn estimated_document_count<'a>(
        &'a self,
        collection: &'a str,
    ) -> BoxFuture<'a, StoreResult<u64>> {
        (**self).estimated_document_count(collection)
    }

    fn insert_one<'a>(
        &'a self,
        collection: &'a str,
        document: Value,
    ) -> BoxFuture<'a, StoreResult<Value>> {
        (**self).insert_one(collection, document)
    }

    fn replace_one<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        document: Value,
    ) -> BoxFuture<'a, StoreResult<Option<Value>>> {
        (**self).replace_one(collection, id, document)
    }

    fn delete_one<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, StoreResult<bool>> {
        (**self).delete_one(collection, id)
    }
}
