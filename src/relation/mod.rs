//! Relation resolution
//!
//! Turns property paths that cross relation properties into a tree of
//! `RelationMap`s and then into ordered join stages. A `RelationSet` tracks
//! which relations a pipeline has already joined so nothing is joined twice.

mod join;
mod map;
mod resolver;
mod set;

pub use join::{dedupe_against_used, to_join_stages};
pub use map::{JoinScope, RelationMap};
pub use resolver::resolve;
pub use set::{is_requested, RelationSet};
