//! Schema error types

use thiserror::Error;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while resolving or validating bucket schemas
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// No bucket with this id
    #[error("schema '{0}' not found")]
    NotFound(String),

    /// Schema definition is structurally invalid
    #[error("malformed schema '{id}': {reason}")]
    Malformed { id: String, reason: String },

    /// The schema source failed (I/O, decode)
    #[error("schema source unavailable: {0}")]
    Unavailable(String),
}

impl SchemaError {
    pub fn not_found(id: impl Into<String>) -> Self {
        SchemaError::NotFound(id.into())
    }

    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::Malformed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        SchemaError::Unavailable(reason.into())
    }
}
