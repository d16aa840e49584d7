//! # Store Errors
//!
//! Error taxonomy shared by every store implementation. The engine never
//! wraps or retries these; they reach the caller unchanged.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    // ==================
    // Record Errors
    // ==================

    /// No record under this id
    #[error("record '{0}' not found")]
    NotFound(String),

    /// A record with this id already exists
    #[error("record '{0}' already exists")]
    AlreadyExists(String),

    /// Record is structurally unusable (missing id, wrong shape)
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    // ==================
    // Backend Errors
    // ==================

    /// Store lock poisoned by a panicking writer
    #[error("store lock poisoned")]
    Poisoned,

    /// Backend-specific failure
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists(id.into())
    }

    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::InvalidRecord(reason.into())
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "BINDERY_STORE_NOT_FOUND",
            Self::AlreadyExists(_) => "BINDERY_STORE_CONFLICT",
            Self::InvalidRecord(_) => "BINDERY_STORE_INVALID_RECORD",
            Self::Poisoned => "BINDERY_STORE_POISONED",
            Self::Backend(_) => "BINDERY_STORE_BACKEND",
        }
    }
}
