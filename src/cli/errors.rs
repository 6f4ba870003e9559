//! CLI-specific error types

use thiserror::Error;

use crate::error::QueryError;
use crate::schema::SchemaError;
use crate::store::StoreError;

/// CLI error. Every variant is fatal for the invocation.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    Input(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl CliError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "CLI_IO_ERROR",
            Self::Json(_) => "CLI_JSON_ERROR",
            Self::Input(_) => "CLI_INVALID_INPUT",
            Self::Runtime(_) => "CLI_RUNTIME_ERROR",
            Self::Query(e) => e.code(),
        }
    }
}

impl From<SchemaError> for CliError {
    fn from(e: SchemaError) -> Self {
        Self::Query(e.into())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::Query(e.into())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_codes_pass_through() {
        let err: CliError = QueryError::forbidden("denied").into();
        assert_eq!(err.code(), "FORBIDDEN");

        let err = CliError::input("data must be an object");
        assert_eq!(err.code(), "CLI_INVALID_INPUT");
        assert_eq!(err.to_string(), "invalid input: data must be an object");
    }
}
