//! # Document Store Trait
//!
//! The contract the versioning layer needs from a document store:
//! single-document atomicity, conditional (compare-and-set) updates, and
//! unique indexes. No multi-document transactions are assumed.

use serde_json::Value;

use crate::document::Document;

use super::errors::StoreResult;
use super::filter::Filter;

/// Condition a stored document must satisfy for a conditional write to apply
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateGuard {
    /// Stored `field` must equal `value`
    FieldEquals { field: String, value: Value },
    /// Stored document must equal this snapshot exactly
    Snapshot(Document),
}

impl UpdateGuard {
    pub fn field_equals(field: impl Into<String>, value: Value) -> Self {
        Self::FieldEquals {
            field: field.into(),
            value,
        }
    }

    /// Whether the currently stored document satisfies the guard
    pub fn admits(&self, stored: &Document) -> bool {
        match self {
            UpdateGuard::FieldEquals { field, value } => stored.get(field) == Some(value),
            UpdateGuard::Snapshot(expected) => stored == expected,
        }
    }
}

/// Result of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Guard held; the write was applied
    Applied,
    /// Guard failed or the document is gone; nothing was written
    ConflictRejected,
}

/// Backend trait for document storage
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id
    fn find_one(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Fetch the first document matching `filter`
    fn find_one_by(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>>;

    /// Fetch every document matching `filter`, in no particular order
    fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>>;

    /// Insert a document, returning its id.
    ///
    /// Fails with `DuplicateKey` if the id or any unique index is taken.
    fn insert(&self, collection: &str, document: Document) -> StoreResult<String>;

    /// Replace document `id` only if the stored document satisfies `guard`
    fn conditional_update(
        &self,
        collection: &str,
        id: &str,
        guard: &UpdateGuard,
        document: Document,
    ) -> StoreResult<UpdateOutcome>;

    /// Remove document `id` only if the stored document satisfies `guard`
    fn conditional_remove(
        &self,
        collection: &str,
        id: &str,
        guard: &UpdateGuard,
    ) -> StoreResult<UpdateOutcome>;

    /// Remove every document matching `filter`, returning how many were removed
    fn remove_many(&self, collection: &str, filter: &Filter) -> StoreResult<usize>;

    /// Declare a unique index over `fields`. Idempotent.
    fn ensure_unique_index(&self, collection: &str, fields: &[&str]) -> StoreResult<()>;
}
