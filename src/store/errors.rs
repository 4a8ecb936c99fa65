//! # Store Errors
//!
//! Error types for document store backends.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Document store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Insert would violate a unique index
    #[error("Duplicate key in {collection}: {key}")]
    DuplicateKey { collection: String, key: String },

    /// Document is not a storable shape
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Backend failure (I/O, lock poisoning, connection loss)
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Get error code string
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::DuplicateKey { .. } => "STORE_DUPLICATE_KEY",
            StoreError::InvalidDocument(_) => "STORE_INVALID_DOCUMENT",
            StoreError::Backend(_) => "STORE_BACKEND_ERROR",
        }
    }
}
