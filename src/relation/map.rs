//! Relation map tree

use crate::expression::PropertyPath;
use crate::schema::{RelationType, Schema};

/// Which relations a set of paths needs joined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinScope {
    /// Rule and filter paths: join a relation only when the path reads a
    /// field of the referenced document
    Predicate,
    /// Requested output paths: join every relation the path reaches
    Output,
}

/// One relation property to join, with the relations reached through it
#[derive(Debug, Clone, PartialEq)]
pub struct RelationMap {
    /// Absolute path from the document root
    pub path: PropertyPath,
    pub target: Schema,
    pub relation_type: RelationType,
    pub children: Vec<RelationMap>,
}
