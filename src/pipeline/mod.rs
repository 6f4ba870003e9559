//! Read pipeline assembly
//!
//! `PipelineBuilder` orders scoping, localization, rule enforcement, user
//! filtering, output joins, projection and pagination into one `Vec<Stage>`
//! the store executes in a single call.

mod builder;
mod request;
mod stage;

pub use builder::{normalize_paginated, PipelineBuilder, TOTAL_FIELD};
pub use request::{Filter, FindRequest};
pub use stage::{stage_names, Lookup, SortDirection, SortSpec, Stage};
