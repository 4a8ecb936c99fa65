//! # Concurrency Gate
//!
//! Precondition checks for mutating operations (If-Match) and conditional
//! reads (If-None-Match). The gate only compares tokens; the compare-and-set
//! that makes the check stick is the caller's conditional update.

use crate::config::{ConcurrencyControl, ResourceVersioningConfig};

use super::errors::{VersioningError, VersioningResult};
use super::fingerprint::normalize_token;

#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyGate {
    control: ConcurrencyControl,
}

impl ConcurrencyGate {
    pub fn new(control: ConcurrencyControl) -> Self {
        Self { control }
    }

    pub fn for_resource(config: &ResourceVersioningConfig) -> Self {
        Self::new(config.concurrency())
    }

    /// Admit a mutating operation against a document whose current
    /// fingerprint is `current`.
    pub fn check(&self, current: &str, token: Option<&str>) -> VersioningResult<()> {
        if !self.control.if_match {
            return Ok(());
        }

        match token {
            None if self.control.enforce_if_match => Err(VersioningError::PreconditionRequired),
            None => Ok(()),
            Some(token) if normalize_token(token) == current => Ok(()),
            Some(_) => Err(VersioningError::PreconditionFailed),
        }
    }

    /// Whether a read carrying `token` should be answered "not modified".
    ///
    /// `*` matches any fingerprint.
    pub fn not_modified(current: &str, token: Option<&str>) -> bool {
        match token.map(normalize_token) {
            Some("*") => true,
            Some(token) => token == current,
            None => false,
        }
    }
}
