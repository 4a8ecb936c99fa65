//! # Versioned Collection
//!
//! The write and read paths for one resource.
//!
//! Writes follow a two-step protocol, since the store offers no
//! cross-collection transactions:
//!
//! 1. conditional update of the primary document, guarded by its stored
//!    fingerprint (or by a full snapshot for documents that predate
//!    fingerprints);
//! 2. append of the shadow record for the new version.
//!
//! A rejected step 1 leaves no trace. A failed step 2 leaves the primary
//! document at the new version with no history for it; this is reported
//! as `Inconsistent` and logged as `SHADOW_WRITE_FAILED`, never retried.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{ResourceVersioningConfig, RetentionPolicy};
use crate::document::{format_timestamp, now, Document};
use crate::observability::{log_event_with_fields, Event, VersioningMetrics};
use crate::store::{DocumentStore, StoreError, UpdateGuard, UpdateOutcome};

use super::diff::FieldDiffEngine;
use super::dispatcher::{ReadOutcome, VersionQueryDispatcher};
use super::errors::{VersioningError, VersioningResult};
use super::fingerprint::FingerprintEngine;
use super::gate::ConcurrencyGate;
use super::resolver::{Operation, Resolution, VersionResolver};
use super::selector::VersionSelector;
use super::shadow::{ShadowRecord, ShadowWriter};

/// Result of an accepted create or update
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    /// Stored document, with its latest version attached
    pub document: Document,
    /// Precondition token for the next write
    pub fingerprint: String,
    /// `None` when versioning is disabled
    pub version: Option<u64>,
    /// History record written for this version
    pub shadow: Option<ShadowRecord>,
}

/// Result of an accepted delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub id: String,
    /// Version the document was at when deleted
    pub version: Option<u64>,
    /// Shadow records removed by the retention policy
    pub purged: usize,
}

/// A resource with version history over a document store
pub struct VersionedCollection<S: DocumentStore> {
    store: Arc<S>,
    config: Arc<ResourceVersioningConfig>,
    metrics: Arc<VersioningMetrics>,
}

impl<S: DocumentStore> VersionedCollection<S> {
    /// Bind a resource to a store, declaring the shadow collection's unique
    /// `(owner, version)` index when versioning is on.
    pub fn new(
        store: Arc<S>,
        config: Arc<ResourceVersioningConfig>,
        metrics: Arc<VersioningMetrics>,
    ) -> VersioningResult<Self> {
        if config.versioning_enabled() {
            store.ensure_unique_index(
                config.shadow_collection(),
                &[config.owner_field(), config.meta().version_field.as_str()],
            )?;
        }
        Ok(Self {
            store,
            config,
            metrics,
        })
    }

    pub fn config(&self) -> &ResourceVersioningConfig {
        &self.config
    }

    pub fn metrics(&self) -> &VersioningMetrics {
        &self.metrics
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ==================
    // Writes
    // ==================

    /// Insert a new document at version 1, or right after the last version
    /// retained from an earlier document with the same id.
    ///
    /// The id is taken from the body when supplied, otherwise generated.
    pub fn create(&self, data: Document) -> VersioningResult<WriteOutcome> {
        let meta = self.config.meta();
        let id = match data.get(&meta.id_field) {
            None => Uuid::new_v4().to_string(),
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(other) => {
                return Err(VersioningError::bad_request(format!(
                    "{} must be a non-empty string, got {}",
                    meta.id_field, other
                )))
            }
        };

        if self.store.find_one(self.config.name(), &id)?.is_some() {
            return Err(self.already_exists(&id));
        }

        let updated_at = now();
        let stamp = Value::String(format_timestamp(&updated_at));
        let mut doc = self.content(data);
        doc.insert(meta.id_field.clone(), Value::String(id.clone()));
        doc.insert(meta.created_field.clone(), stamp.clone());
        doc.insert(meta.updated_field.clone(), stamp);

        let resolver = VersionResolver::new(&self.config);
        let resolution = self.resume_history(&id, resolver.resolve(Operation::Create, &doc)?)?;
        if let Some(resolution) = &resolution {
            resolver.apply(resolution, &mut doc);
        }
        let fingerprint = self.seal(&mut doc);

        match self.store.insert(self.config.name(), self.persisted(&doc)) {
            Ok(_) => {}
            Err(StoreError::DuplicateKey { .. }) => return Err(self.already_exists(&id)),
            Err(err) => return Err(err.into()),
        }

        self.metrics.increment_documents_created();
        log_event_with_fields(
            Event::DocumentCreated,
            &[("resource", self.config.name()), ("id", id.as_str())],
        );

        let shadow = match &resolution {
            Some(resolution) => {
                self.metrics.increment_versions_committed();
                Some(self.commit_shadow(&id, resolution, None, &doc, updated_at)?)
            }
            None => None,
        };

        Ok(WriteOutcome {
            document: doc,
            fingerprint,
            version: resolution.map(|r| r.version),
            shadow,
        })
    }

    /// Replace every content field of document `id` (PUT)
    pub fn replace(
        &self,
        id: &str,
        data: Document,
        if_match: Option<&str>,
    ) -> VersioningResult<WriteOutcome> {
        self.update_with(id, if_match, |_| self.content(data))
    }

    /// Merge top-level fields into document `id` (PATCH)
    pub fn patch(
        &self,
        id: &str,
        changes: Document,
        if_match: Option<&str>,
    ) -> VersioningResult<WriteOutcome> {
        self.update_with(id, if_match, |original| {
            let mut doc = self.content(original.clone());
            doc.merge(self.content(changes));
            doc
        })
    }

    /// Remove document `id`, then apply the retention policy to its history
    pub fn delete(&self, id: &str, if_match: Option<&str>) -> VersioningResult<DeleteOutcome> {
        let original = self.load(id)?;
        let current = self.current_fingerprint(&original)?;
        self.admit(id, &current, if_match)?;

        let version = VersionResolver::new(&self.config).current_version(&original)?;
        match self
            .store
            .conditional_remove(self.config.name(), id, &self.guard(&original))?
        {
            UpdateOutcome::Applied => {}
            UpdateOutcome::ConflictRejected => return Err(self.conflict(id)),
        }

        self.metrics.increment_documents_deleted();
        log_event_with_fields(
            Event::DocumentDeleted,
            &[("resource", self.config.name()), ("id", id)],
        );

        let purged = match self.config.retention() {
            RetentionPolicy::Keep => 0,
            RetentionPolicy::Purge => {
                let purged = ShadowWriter::new(&*self.store, &self.config).purge(id)?;
                log_event_with_fields(
                    Event::ShadowPurged,
                    &[
                        ("collection", self.config.shadow_collection()),
                        ("id", id),
                        ("records", purged.to_string().as_str()),
                    ],
                );
                purged
            }
        };

        Ok(DeleteOutcome {
            id: id.to_string(),
            version,
            purged,
        })
    }

    // ==================
    // Reads
    // ==================

    /// Read document `id` at the selected version(s).
    ///
    /// Documents that predate versioning read as version 0.
    pub fn read(
        &self,
        id: &str,
        selector: VersionSelector,
        if_none_match: Option<&str>,
    ) -> VersioningResult<ReadOutcome> {
        let mut live = self.load(id)?;
        let resolver = VersionResolver::new(&self.config);
        if let Some(resolution) = resolver.resolve(Operation::Read { prior: None }, &live)? {
            resolver.apply(&resolution, &mut live);
        }

        let outcome = VersionQueryDispatcher::new(&*self.store, &self.config).dispatch(
            &live,
            selector,
            if_none_match,
        )?;

        if self.config.versioning_enabled() && selector.is_historical() {
            self.metrics.increment_historical_reads();
            log_event_with_fields(
                Event::HistoryRead,
                &[
                    ("resource", self.config.name()),
                    ("id", id),
                    ("selector", selector.to_string().as_str()),
                ],
            );
        }

        Ok(outcome)
    }

    /// Raw shadow records for `id`, ascending. History kept after a delete
    /// is still returned.
    pub fn shadow_records(&self, id: &str) -> VersioningResult<Vec<ShadowRecord>> {
        ShadowWriter::new(&*self.store, &self.config).history(id)
    }

    // ==================
    // Internals
    // ==================

    fn load(&self, id: &str) -> VersioningResult<Document> {
        self.store
            .find_one(self.config.name(), id)?
            .ok_or_else(|| VersioningError::DocumentNotFound {
                resource: self.config.name().to_string(),
                id: id.to_string(),
            })
    }

    /// Anchors for an id with retained history (kept after a delete, or left
    /// behind before a late catch) continue after its last recorded version,
    /// so no version number of that id is ever reused.
    fn resume_history(
        &self,
        id: &str,
        resolution: Option<Resolution>,
    ) -> VersioningResult<Option<Resolution>> {
        let mut resolution = match resolution {
            Some(resolution) if resolution.is_anchor() => resolution,
            other => return Ok(other),
        };
        let retained = ShadowWriter::new(&*self.store, &self.config).history(id)?;
        if let Some(last) = retained.last() {
            resolution.resume_after(last.version);
            let resumed = resolution.version.to_string();
            log_event_with_fields(
                Event::HistoryResumed,
                &[
                    ("resource", self.config.name()),
                    ("id", id),
                    ("version", resumed.as_str()),
                ],
            );
        }
        Ok(Some(resolution))
    }

    /// Fingerprint of `original` as a read would present it, so tokens
    /// from reads of legacy documents (backfilled to version 0) still match.
    fn current_fingerprint(&self, original: &Document) -> VersioningResult<String> {
        let resolver = VersionResolver::new(&self.config);
        let mut presented = original.clone();
        if let Some(resolution) = resolver.resolve(Operation::Read { prior: None }, original)? {
            resolver.apply(&resolution, &mut presented);
        }
        Ok(FingerprintEngine::for_resource(&self.config).compute(&presented))
    }

    /// Client content with every metadata field dropped
    fn content(&self, mut data: Document) -> Document {
        let reserved = self.config.meta().reserved();
        data.retain(|field, _| !reserved.contains(field));
        data
    }

    /// Compute and attach the fingerprint
    fn seal(&self, doc: &mut Document) -> String {
        let fingerprint = FingerprintEngine::for_resource(&self.config).compute(doc);
        doc.insert(
            self.config.meta().etag_field.clone(),
            Value::String(fingerprint.clone()),
        );
        fingerprint
    }

    /// Stored form: the latest-version field is only attached on output
    fn persisted(&self, doc: &Document) -> Document {
        let mut stored = doc.clone();
        stored.remove(&self.config.meta().latest_version_field);
        stored
    }

    fn guard(&self, original: &Document) -> UpdateGuard {
        let etag_field = &self.config.meta().etag_field;
        match original.get(etag_field) {
            Some(etag) => UpdateGuard::field_equals(etag_field.clone(), etag.clone()),
            None => UpdateGuard::Snapshot(original.clone()),
        }
    }

    fn admit(&self, id: &str, current: &str, if_match: Option<&str>) -> VersioningResult<()> {
        ConcurrencyGate::for_resource(&self.config)
            .check(current, if_match)
            .map_err(|err| {
                self.metrics.increment_precondition_rejections();
                log_event_with_fields(
                    Event::PreconditionRejected,
                    &[
                        ("resource", self.config.name()),
                        ("id", id),
                        ("code", err.code()),
                    ],
                );
                err
            })
    }

    fn already_exists(&self, id: &str) -> VersioningError {
        VersioningError::AlreadyExists {
            resource: self.config.name().to_string(),
            id: id.to_string(),
        }
    }

    fn conflict(&self, id: &str) -> VersioningError {
        self.metrics.increment_conflict_rejections();
        log_event_with_fields(
            Event::ConflictRejected,
            &[("resource", self.config.name()), ("id", id)],
        );
        VersioningError::PreconditionFailed
    }

    fn update_with<F>(&self, id: &str, if_match: Option<&str>, build: F) -> VersioningResult<WriteOutcome>
    where
        F: FnOnce(&Document) -> Document,
    {
        let meta = self.config.meta();
        let original = self.load(id)?;
        let current = self.current_fingerprint(&original)?;
        self.admit(id, &current, if_match)?;

        let updated_at = now();
        let mut doc = build(&original);
        doc.insert(meta.id_field.clone(), Value::String(id.to_string()));
        if let Some(created) = original.get(&meta.created_field) {
            doc.insert(meta.created_field.clone(), created.clone());
        }
        doc.insert(
            meta.updated_field.clone(),
            Value::String(format_timestamp(&updated_at)),
        );

        let resolver = VersionResolver::new(&self.config);
        let resolution =
            self.resume_history(id, resolver.resolve(Operation::Update { prior: Some(&original) }, &doc)?)?;
        match &resolution {
            Some(resolution) => resolver.apply(resolution, &mut doc),
            None => {
                if let Some(version) = original.get(&meta.version_field) {
                    doc.insert(meta.version_field.clone(), version.clone());
                }
            }
        }
        let fingerprint = self.seal(&mut doc);

        match self.store.conditional_update(
            self.config.name(),
            id,
            &self.guard(&original),
            self.persisted(&doc),
        )? {
            UpdateOutcome::Applied => {}
            UpdateOutcome::ConflictRejected => return Err(self.conflict(id)),
        }

        let shadow = match &resolution {
            Some(resolution) => {
                self.metrics.increment_versions_committed();
                let version = resolution.version.to_string();
                let event = if resolution.late_catch {
                    Event::LateVersioningCatch
                } else {
                    Event::VersionCommitted
                };
                log_event_with_fields(
                    event,
                    &[
                        ("resource", self.config.name()),
                        ("id", id),
                        ("version", version.as_str()),
                    ],
                );

                let previous = if resolution.is_anchor() {
                    None
                } else {
                    Some(&original)
                };
                Some(self.commit_shadow(id, resolution, previous, &doc, updated_at)?)
            }
            None => None,
        };

        Ok(WriteOutcome {
            document: doc,
            fingerprint,
            version: resolution.map(|r| r.version),
            shadow,
        })
    }

    /// Append the history record for a committed version
    fn commit_shadow(
        &self,
        id: &str,
        resolution: &Resolution,
        previous: Option<&Document>,
        current: &Document,
        updated_at: DateTime<Utc>,
    ) -> VersioningResult<ShadowRecord> {
        let diff = FieldDiffEngine::new(self.config.versioned_fields()).diff(
            previous,
            current,
            resolution.is_anchor(),
            updated_at,
        );
        let record = ShadowRecord::from_diff(id, resolution.version, diff);

        match ShadowWriter::new(&*self.store, &self.config).append(&record) {
            Ok(_) => {
                self.metrics.increment_shadow_records();
                Ok(record)
            }
            Err(err) => {
                self.metrics.increment_shadow_failures();
                let version = resolution.version.to_string();
                let reason = err.to_string();
                log_event_with_fields(
                    Event::ShadowWriteFailed,
                    &[
                        ("resource", self.config.name()),
                        ("id", id),
                        ("version", version.as_str()),
                        ("error", reason.as_str()),
                    ],
                );
                Err(VersioningError::inconsistent(format!(
                    "{}/{} committed at version {} without history: {}",
                    self.config.name(),
                    id,
                    resolution.version,
                    reason
                )))
            }
        }
    }
}
