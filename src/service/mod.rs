//! Request orchestration over buckets

mod data;
mod patch;

pub use data::{BucketDataService, FindResult, Meta};
pub use patch::merge_patch;
