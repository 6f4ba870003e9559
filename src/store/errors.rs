//! Store error types

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a document store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend failed; message preserved verbatim
    #[error("{0}")]
    Backend(String),

    /// A uniqueness constraint was violated on `field`
    #[error("duplicate key on field '{field}'")]
    DuplicateKey { field: String },

    /// The document cannot be stored (not an object, bad `_id`)
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        StoreError::Backend(msg.into())
    }

    pub fn invalid_document(msg: impl Into<String>) -> Self {
        StoreError::InvalidDocument(msg.into())
    }

    pub fn duplicate_key(field: impl Into<String>) -> Self {
        StoreError::DuplicateKey {
            field: field.into(),
        }
    }
}
