//! Crate-wide error type
//!
//! Subsystems with their own taxonomy (store, schema validation) define
//! their errors locally and convert into [`Error`] with `?`.
//!
//! Error codes:
//! - BINDERY_UNKNOWN_TYPE
//! - BINDERY_UNKNOWN_RESOLVER
//! - BINDERY_NOT_A_FIELD
//! - BINDERY_VALIDATION_FAILED
//! - BINDERY_STORE_* (delegated to [`StoreError`])
//! - BINDERY_INVALID_PREDICATE
//! - BINDERY_PREDICATE_PARSE
//! - BINDERY_INVALID_DEFINITION
//! - BINDERY_TYPE_MISMATCH
//! - BINDERY_UNSUPPORTED
//! - BINDERY_SERIALIZATION
//! - BINDERY_CONFIG
//! - BINDERY_IO

use thiserror::Error;

use crate::schema::ValidationError;
use crate::store::StoreError;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the binding engine
#[derive(Debug, Error)]
pub enum Error {
    /// No resource type registered under this name
    #[error("unknown resource type '{0}'")]
    UnknownType(String),

    /// Selector, predicate or order key names a resolver the type lacks
    #[error("unknown resolver '{name}' on {type_name}")]
    UnknownResolver { type_name: String, name: String },

    /// The resolver exists but is not backed by a schema field
    #[error("resolver '{name}' on {type_name} is not a field")]
    NotAField { type_name: String, name: String },

    /// Field coercion failed during a write
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Storage failure, propagated unchanged
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Structurally invalid predicate (bad op code, malformed dump, ...)
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),

    /// Textual predicate could not be parsed
    #[error("predicate parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    /// Resource definitions could not be assembled into a registry
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    /// A resource of one type was used where another was expected
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Operation not available for this resolver or mode
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// JSON (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("config error: {0}")]
    Config(String),

    /// I/O failure while reading configuration or definitions
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an unknown resolver error
    pub fn unknown_resolver(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnknownResolver {
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    /// Create a not-a-field error
    pub fn not_a_field(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotAField {
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    /// Create an invalid predicate error
    pub fn invalid_predicate(reason: impl Into<String>) -> Self {
        Self::InvalidPredicate(reason.into())
    }

    /// Create a parse error
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create an invalid definition error
    pub fn invalid_definition(reason: impl Into<String>) -> Self {
        Self::InvalidDefinition(reason.into())
    }

    /// Create an unsupported operation error
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported(reason.into())
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownType(_) => "BINDERY_UNKNOWN_TYPE",
            Self::UnknownResolver { .. } => "BINDERY_UNKNOWN_RESOLVER",
            Self::NotAField { .. } => "BINDERY_NOT_A_FIELD",
            Self::Validation(_) => "BINDERY_VALIDATION_FAILED",
            Self::Store(e) => e.code(),
            Self::InvalidPredicate(_) => "BINDERY_INVALID_PREDICATE",
            Self::Parse { .. } => "BINDERY_PREDICATE_PARSE",
            Self::InvalidDefinition(_) => "BINDERY_INVALID_DEFINITION",
            Self::TypeMismatch { .. } => "BINDERY_TYPE_MISMATCH",
            Self::Unsupported(_) => "BINDERY_UNSUPPORTED",
            Self::Serialization(_) => "BINDERY_SERIALIZATION",
            Self::Config(_) => "BINDERY_CONFIG",
            Self::Io(_) => "BINDERY_IO",
        }
    }

    /// Programming errors (bad names, bad definitions) are never retried or
    /// suppressed by callers.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownType(_)
                | Self::UnknownResolver { .. }
                | Self::NotAField { .. }
                | Self::InvalidDefinition(_)
                | Self::InvalidPredicate(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::unknown_resolver("Dog", "wings").code(),
            "BINDERY_UNKNOWN_RESOLVER"
        );
        assert_eq!(
            Error::UnknownType("Cat".into()).code(),
            "BINDERY_UNKNOWN_TYPE"
        );
        assert_eq!(Error::parse(3, "eof").code(), "BINDERY_PREDICATE_PARSE");
    }

    #[test]
    fn test_store_code_delegated() {
        let err: Error = StoreError::not_found("abc").into();
        assert_eq!(err.code(), "BINDERY_STORE_NOT_FOUND");
    }

    #[test]
    fn test_display() {
        let err = Error::unknown_resolver("Dog", "wings");
        let display = err.to_string();
        assert!(display.contains("wings"));
        assert!(display.contains("Dog"));
        assert!(err.is_programming_error());
    }
}
