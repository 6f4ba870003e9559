//! bucketql - access-controlled query compiler for document buckets
//!
//! Turns a caller's find request plus the bucket's ACL rules into an
//! aggregation pipeline, resolving relations across buckets, and guards
//! writes by re-evaluating the write rule against the candidate document.

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod expression;
pub mod guard;
pub mod locale;
pub mod observability;
pub mod pipeline;
pub mod relation;
pub mod schema;
pub mod service;
pub mod store;

pub use config::CompilerConfig;
pub use error::{QueryError, QueryResult};
pub use pipeline::{FindRequest, PipelineBuilder, Stage};
pub use service::{BucketDataService, FindResult};
