//! # Fingerprint Engine
//!
//! Content fingerprints ("ETags") used as optimistic-concurrency tokens.
//!
//! The fingerprint is the SHA-256 of the document's canonical JSON with the
//! fingerprint field itself, the latest-version field and any configured
//! ignore fields removed. `serde_json::Map` keeps keys sorted, so the
//! canonical form does not depend on insertion order.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use crate::config::ResourceVersioningConfig;
use crate::document::Document;

/// Computes fingerprints for one resource
#[derive(Debug, Clone, Copy)]
pub struct FingerprintEngine<'a> {
    ignore: &'a BTreeSet<String>,
}

impl<'a> FingerprintEngine<'a> {
    pub fn for_resource(config: &'a ResourceVersioningConfig) -> Self {
        Self {
            ignore: config.etag_ignore(),
        }
    }

    /// Fingerprint of `doc`'s observable content
    pub fn compute(&self, doc: &Document) -> String {
        let mut canonical = doc.clone();
        canonical.retain(|field, _| !self.ignore.contains(field));

        let mut hasher = Sha256::new();
        hasher.update(canonical.into_value().to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Whether a client token names this document's current content
    pub fn matches(&self, doc: &Document, token: &str) -> bool {
        normalize_token(token) == self.compute(doc)
    }
}

/// Strip the weak prefix and surrounding quotes from a client token.
///
/// `W/"abc"`, `"abc"` and `abc` all normalize to `abc`.
pub fn normalize_token(token: &str) -> &str {
    let token = token.trim();
    let token = token.strip_prefix("W/").unwrap_or(token);
    token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(token)
}
