//! CLI-specific error types
//!
//! A `CliError` ends the process with a non-zero exit. Failures of single
//! replayed operations are not `CliError`s; they are written to stdout as
//! error responses and the replay continues.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::versioning::VersioningError;

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

/// CLI errors
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A collection could not be bound to the store
    #[error("{0}")]
    Setup(#[from] VersioningError),

    /// Unusable command-line argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error (stdin/stdout/script file)
    #[error("I/O error: {0}")]
    Io(String),
}

impl CliError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(err) => err.code(),
            CliError::Setup(err) => err.code(),
            CliError::InvalidArgument(_) => "CLI_INVALID_ARGUMENT",
            CliError::Io(_) => "CLI_IO_ERROR",
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}
