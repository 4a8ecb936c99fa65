//! # Versioning Errors
//!
//! Every failure the versioning layer surfaces to its caller. None of these
//! are retried internally.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for versioning operations
pub type VersioningResult<T> = Result<T, VersioningError>;

/// Versioning errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersioningError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Mutating operation carried no precondition token
    #[error("Precondition required: send the current fingerprint")]
    PreconditionRequired,

    /// Token did not match, or a concurrent writer won the race
    #[error("Precondition failed: the document has changed")]
    PreconditionFailed,

    /// Unknown document id
    #[error("Document not found: {resource}/{id}")]
    DocumentNotFound { resource: String, id: String },

    /// Document exists, requested version does not
    #[error("Version {version} not found for document {id}")]
    VersionNotFound { id: String, version: u64 },

    /// Client-supplied id is already taken
    #[error("Document already exists: {resource}/{id}")]
    AlreadyExists { resource: String, id: String },

    /// Malformed version selector or document body
    #[error("Bad request: {0}")]
    BadRequest(String),

    // ==================
    // Server Errors (5xx)
    // ==================
    /// Stored state contradicts a versioning invariant
    #[error("Inconsistent version history: {0}")]
    Inconsistent(String),

    /// Underlying store failure
    #[error("{0}")]
    Store(#[from] StoreError),
}

impl VersioningError {
    pub fn inconsistent(msg: impl Into<String>) -> Self {
        Self::Inconsistent(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Get error code string
    pub fn code(&self) -> &'static str {
        match self {
            VersioningError::PreconditionRequired => "PRECONDITION_REQUIRED",
            VersioningError::PreconditionFailed => "PRECONDITION_FAILED",
            VersioningError::DocumentNotFound { .. } => "DOCUMENT_NOT_FOUND",
            VersioningError::VersionNotFound { .. } => "VERSION_NOT_FOUND",
            VersioningError::AlreadyExists { .. } => "ALREADY_EXISTS",
            VersioningError::BadRequest(_) => "BAD_REQUEST",
            VersioningError::Inconsistent(_) => "INCONSISTENT",
            VersioningError::Store(err) => err.code(),
        }
    }

    /// HTTP-equivalent status code
    pub fn status_code(&self) -> u16 {
        match self {
            VersioningError::PreconditionRequired => 428,
            VersioningError::PreconditionFailed => 412,
            VersioningError::DocumentNotFound { .. } => 404,
            VersioningError::VersionNotFound { .. } => 404,
            VersioningError::AlreadyExists { .. } => 409,
            VersioningError::BadRequest(_) => 400,
            VersioningError::Inconsistent(_) => 500,
            VersioningError::Store(_) => 500,
        }
    }

    /// Whether the caller, not the server, is at fault
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
