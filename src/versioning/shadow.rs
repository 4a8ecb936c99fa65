//! # Shadow Writer
//!
//! Append-only history records, one per version transition, kept in a
//! collection parallel to the resource.
//!
//! Stored shape:
//!
//! ```text
//! {
//!   "_id_document": "<owner id>",
//!   "_version": 3,
//!   "_updated": "2024-01-01T00:00:00.000Z",
//!   "<changed field>": ...,
//!   "_carried": { "<unchanged versioned field>": ... }
//! }
//! ```
//!
//! The unique index on `(owner, version)` is what makes a duplicate record a
//! store-level error rather than silent corruption. A duplicate whose
//! content matches the existing record is an idempotent retry.
//!
//! `VersionedCollection` appends each record once and never retries. Retries
//! come from callers of `ShadowWriter::append` outside it: a repair job
//! re-appending the record of a write that reported `Inconsistent`, or a
//! store client that re-sends an insert whose acknowledgement was lost even
//! though the record landed.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::ResourceVersioningConfig;
use crate::document::{format_timestamp, parse_timestamp, Document};
use crate::observability::{log_event_with_fields, Event};
use crate::store::{DocumentStore, Filter, StoreError};

use super::diff::FieldDiff;
use super::errors::{VersioningError, VersioningResult};

/// One version transition of one document
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowRecord {
    pub owner_id: String,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    /// Fields that changed at this version
    pub changed: Document,
    /// Versioned fields carried forward unchanged
    pub carried: Document,
}

impl ShadowRecord {
    pub fn from_diff(owner_id: impl Into<String>, version: u64, diff: FieldDiff) -> Self {
        Self {
            owner_id: owner_id.into(),
            version,
            updated_at: diff.updated_at,
            changed: diff.changed,
            carried: diff.carried,
        }
    }

    /// Full versioned state at this version
    pub fn full_state(&self) -> Document {
        let mut state = self.carried.clone();
        state.merge(self.changed.clone());
        state
    }

    /// Same transition, ignoring the write timestamp
    pub fn same_content(&self, other: &ShadowRecord) -> bool {
        self.owner_id == other.owner_id
            && self.version == other.version
            && self.changed == other.changed
            && self.carried == other.carried
    }

    pub fn to_document(&self, config: &ResourceVersioningConfig) -> Document {
        let meta = config.meta();
        let mut doc = self.changed.clone();
        doc.insert(config.owner_field(), Value::String(self.owner_id.clone()));
        doc.insert(meta.version_field.clone(), Value::from(self.version));
        doc.insert(
            meta.updated_field.clone(),
            Value::String(format_timestamp(&self.updated_at)),
        );
        doc.insert(meta.carried_field.clone(), self.carried.clone().into_value());
        doc
    }

    pub fn from_document(doc: &Document, config: &ResourceVersioningConfig) -> VersioningResult<Self> {
        let meta = config.meta();
        let malformed = |what: &str| {
            VersioningError::inconsistent(format!(
                "malformed record in {}: {}",
                config.shadow_collection(),
                what
            ))
        };

        let owner_id = doc
            .get_str(config.owner_field())
            .ok_or_else(|| malformed("missing owner"))?
            .to_string();
        let version = doc
            .get(&meta.version_field)
            .and_then(Value::as_u64)
            .ok_or_else(|| malformed("missing version"))?;
        let updated_at = doc
            .get_str(&meta.updated_field)
            .and_then(parse_timestamp)
            .ok_or_else(|| malformed("missing timestamp"))?;
        let carried = match doc.get(&meta.carried_field) {
            None => Document::new(),
            Some(value) => Document::from_value(value.clone())
                .ok_or_else(|| malformed("carried state is not an object"))?,
        };

        let reserved = meta.reserved();
        let mut changed = doc.clone();
        changed.retain(|field, _| !reserved.contains(field));

        Ok(Self {
            owner_id,
            version,
            updated_at,
            changed,
            carried,
        })
    }
}

/// Outcome of an append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowWrite {
    Appended,
    /// An identical record was already stored
    Deduplicated,
}

/// Reads and appends shadow records for one resource
pub struct ShadowWriter<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    config: &'a ResourceVersioningConfig,
}

impl<'a, S: DocumentStore + ?Sized> ShadowWriter<'a, S> {
    pub fn new(store: &'a S, config: &'a ResourceVersioningConfig) -> Self {
        Self { store, config }
    }

    fn record_filter(&self, owner_id: &str, version: u64) -> Filter {
        Filter::new()
            .eq(self.config.owner_field(), Value::String(owner_id.to_string()))
            .eq(&self.config.meta().version_field, Value::from(version))
    }

    /// Append a record. Never overwrites.
    pub fn append(&self, record: &ShadowRecord) -> VersioningResult<ShadowWrite> {
        let collection = self.config.shadow_collection();
        let version = record.version.to_string();

        match self.store.insert(collection, record.to_document(self.config)) {
            Ok(_) => {
                log_event_with_fields(
                    Event::ShadowWritten,
                    &[
                        ("collection", collection),
                        ("owner", record.owner_id.as_str()),
                        ("version", version.as_str()),
                    ],
                );
                Ok(ShadowWrite::Appended)
            }
            Err(StoreError::DuplicateKey { .. }) => {
                let existing = self.lookup(&record.owner_id, record.version)?.ok_or_else(|| {
                    VersioningError::inconsistent(format!(
                        "duplicate key for {} version {} but no record found",
                        record.owner_id, record.version
                    ))
                })?;
                if !existing.same_content(record) {
                    return Err(VersioningError::inconsistent(format!(
                        "{} version {} already recorded with different content",
                        record.owner_id, record.version
                    )));
                }
                log_event_with_fields(
                    Event::ShadowRetryDeduplicated,
                    &[
                        ("collection", collection),
                        ("owner", record.owner_id.as_str()),
                        ("version", version.as_str()),
                    ],
                );
                Ok(ShadowWrite::Deduplicated)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Fetch the record for `(owner_id, version)`
    pub fn lookup(&self, owner_id: &str, version: u64) -> VersioningResult<Option<ShadowRecord>> {
        self.store
            .find_one_by(
                self.config.shadow_collection(),
                &self.record_filter(owner_id, version),
            )?
            .map(|doc| ShadowRecord::from_document(&doc, self.config))
            .transpose()
    }

    /// Every record for `owner_id`, ascending by version
    pub fn history(&self, owner_id: &str) -> VersioningResult<Vec<ShadowRecord>> {
        let filter = Filter::new().eq(self.config.owner_field(), Value::String(owner_id.to_string()));
        let mut records = self
            .store
            .find(self.config.shadow_collection(), &filter)?
            .iter()
            .map(|doc| ShadowRecord::from_document(doc, self.config))
            .collect::<VersioningResult<Vec<_>>>()?;
        records.sort_by_key(|r| r.version);
        Ok(records)
    }

    /// Remove every record for `owner_id`
    pub fn purge(&self, owner_id: &str) -> VersioningResult<usize> {
        let filter = Filter::new().eq(self.config.owner_field(), Value::String(owner_id.to_string()));
        Ok(self.store.remove_many(self.config.shadow_collection(), &filter)?)
    }
}
