//! Expression error types
//!
//! Every variant is a client error: the rule or filter text is malformed.
//! Positions are byte offsets into the source expression.

use thiserror::Error;

/// Result type for expression operations
pub type ExpressionResult<T> = Result<T, ExpressionError>;

/// Errors raised while tokenizing or parsing a rule expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// Expression contains nothing but whitespace
    #[error("empty expression")]
    Empty,

    /// A character that starts no token
    #[error("unexpected character '{found}' at position {position}")]
    UnexpectedCharacter { found: char, position: usize },

    /// A token in a place the grammar does not allow it
    #[error("unexpected token '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },

    /// Input ended while more tokens were required
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// String literal without closing quote
    #[error("unterminated string starting at position {position}")]
    UnterminatedString { position: usize },

    /// Numeric literal that does not parse
    #[error("invalid number '{literal}' at position {position}")]
    InvalidNumber { literal: String, position: usize },

    /// Property access rooted at something other than `auth` or `document`
    #[error("unknown identifier '{name}' at position {position}, expected 'auth' or 'document'")]
    UnknownRoot { name: String, position: usize },

    /// Nesting limit exceeded
    #[error("expression nesting exceeds maximum depth of {0}")]
    TooDeep(usize),

    /// Structured filter that cannot be translated
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

impl ExpressionError {
    /// Returns a stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ExpressionError::Empty => "EXPR_EMPTY",
            ExpressionError::UnexpectedCharacter { .. } => "EXPR_UNEXPECTED_CHARACTER",
            ExpressionError::UnexpectedToken { .. } => "EXPR_UNEXPECTED_TOKEN",
            ExpressionError::UnexpectedEnd => "EXPR_UNEXPECTED_END",
            ExpressionError::UnterminatedString { .. } => "EXPR_UNTERMINATED_STRING",
            ExpressionError::InvalidNumber { .. } => "EXPR_INVALID_NUMBER",
            ExpressionError::UnknownRoot { .. } => "EXPR_UNKNOWN_ROOT",
            ExpressionError::TooDeep(_) => "EXPR_TOO_DEEP",
            ExpressionError::InvalidFilter(_) => "EXPR_INVALID_FILTER",
        }
    }
}
