//! Query compiler errors
//!
//! Every failure surfaced to callers is a `QueryError`. Module errors convert
//! into it via `From`. Nothing in this crate retries; callers decide.

use thiserror::Error;

use crate::expression::ExpressionError;
use crate::schema::SchemaError;
use crate::store::StoreError;

/// Result type for compiler operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Compiler error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Rule or filter expression does not parse
    #[error("ACL syntax error: {0}")]
    AclSyntax(String),

    /// Write rule evaluated false
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Underlying store failure, original message preserved
    #[error("Store error: {0}")]
    Store(String),

    /// Schema lookup or validation failure
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Insert or replace violates a uniqueness constraint
    #[error("Value of the property '{field}' should be unique across all documents")]
    UniqueConflict { field: String },

    /// Insert rejected by the `prevent` document limit policy
    #[error("Maximum number of documents ({limit}) has been reached")]
    DocumentLimitExceeded { limit: u64 },

    /// Malformed request shape
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl QueryError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Get error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::AclSyntax(_) => "ACL_SYNTAX_ERROR",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Store(_) => "STORE_ERROR",
            Self::Schema(SchemaError::NotFound(_)) => "SCHEMA_NOT_FOUND",
            Self::Schema(_) => "SCHEMA_ERROR",
            Self::UniqueConflict { .. } => "UNIQUE_CONFLICT",
            Self::DocumentLimitExceeded { .. } => "DOCUMENT_LIMIT_EXCEEDED",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AclSyntax(_) => 400,
            Self::UniqueConflict { .. } => 400,
            Self::InvalidRequest(_) => 400,
            Self::Forbidden(_) => 403,
            Self::Schema(SchemaError::NotFound(_)) => 404,
            Self::DocumentLimitExceeded { .. } => 422,
            Self::Store(_) => 500,
            Self::Schema(_) => 500,
            Self::Config(_) => 500,
        }
    }

    /// Returns whether this error should be logged at warn level
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

impl From<ExpressionError> for QueryError {
    fn from(e: ExpressionError) -> Self {
        Self::AclSyntax(e.to_string())
    }
}

impl From<StoreError> for QueryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateKey { field } => Self::UniqueConflict { field },
            other => Self::Store(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(QueryError::AclSyntax("x".into()).status_code(), 400);
        assert_eq!(QueryError::forbidden("x").status_code(), 403);
        assert_eq!(QueryError::store("x").status_code(), 500);
        assert_eq!(
            QueryError::from(SchemaError::not_found("posts")).status_code(),
            404
        );
        assert!(QueryError::DocumentLimitExceeded { limit: 3 }.is_client_error());
    }

    #[test]
    fn test_acl_syntax_is_prefixed() {
        let err = QueryError::from(ExpressionError::UnexpectedEnd);
        assert_eq!(err.to_string(), "ACL syntax error: unexpected end of expression");
        assert_eq!(err.code(), "ACL_SYNTAX_ERROR");
    }

    #[test]
    fn test_store_errors_preserve_message_and_map_duplicates() {
        let err = QueryError::from(StoreError::backend("connection reset"));
        assert!(err.to_string().contains("connection reset"));

        let err = QueryError::from(StoreError::DuplicateKey {
            field: "email".into(),
        });
        assert_eq!(
            err,
            QueryError::UniqueConflict {
                field: "email".into()
            }
        );
        assert!(err.to_string().contains("email"));
    }
}
