//! # Version Synthesizer
//!
//! Rebuilds a historical document from the live document and the single
//! shadow record for the requested version. Versioned fields come from the
//! record; unversioned fields always show their current live value.

use serde_json::Value;

use crate::config::ResourceVersioningConfig;
use crate::document::{format_timestamp, Document};

use super::errors::{VersioningError, VersioningResult};
use super::fingerprint::FingerprintEngine;
use super::resolver::{Operation, VersionResolver};
use super::shadow::ShadowRecord;

#[derive(Debug, Clone, Copy)]
pub struct VersionSynthesizer<'a> {
    config: &'a ResourceVersioningConfig,
}

impl<'a> VersionSynthesizer<'a> {
    pub fn new(config: &'a ResourceVersioningConfig) -> Self {
        Self { config }
    }

    fn check_owner(&self, live: &Document, record: &ShadowRecord) -> VersioningResult<()> {
        let id = live.get_str(&self.config.meta().id_field);
        if id != Some(record.owner_id.as_str()) {
            return Err(VersioningError::inconsistent(format!(
                "record for {} version {} applied to document {}",
                record.owner_id,
                record.version,
                id.unwrap_or("<no id>")
            )));
        }
        Ok(())
    }

    /// Overlay version metadata and refresh the fingerprint. The latest
    /// version is resolved relative to the live document.
    fn stamp(&self, doc: &mut Document, record: &ShadowRecord, live: &Document) -> VersioningResult<()> {
        let meta = self.config.meta();
        doc.insert(meta.version_field.clone(), Value::from(record.version));
        let resolver = VersionResolver::new(self.config);
        if let Some(resolution) = resolver.resolve(Operation::Read { prior: Some(live) }, doc)? {
            resolver.apply(&resolution, doc);
        }
        doc.insert(
            meta.updated_field.clone(),
            Value::String(format_timestamp(&record.updated_at)),
        );
        let fingerprint = FingerprintEngine::for_resource(self.config).compute(doc);
        doc.insert(meta.etag_field.clone(), Value::String(fingerprint));
        Ok(())
    }

    /// The document as it was at `record.version`
    pub fn synthesize(&self, live: &Document, record: &ShadowRecord) -> VersioningResult<Document> {
        self.check_owner(live, record)?;
        let fields = self.config.versioned_fields();

        let mut doc = live.clone();
        doc.retain(|field, _| !fields.contains(field));
        doc.merge(fields.project(&record.full_state()));

        self.stamp(&mut doc, record, live)?;
        Ok(doc)
    }

    /// A partial document holding only what changed at `record.version`,
    /// plus any always-included fields.
    pub fn diff_entry(&self, live: &Document, record: &ShadowRecord) -> VersioningResult<Document> {
        self.check_owner(live, record)?;
        let meta = self.config.meta();

        let mut doc = record.changed.clone();
        doc.insert(meta.id_field.clone(), Value::String(record.owner_id.clone()));

        let state = record.full_state();
        for field in self.config.diff_include() {
            let value = if self.config.versioned_fields().contains(field) {
                state.get(field)
            } else {
                live.get(field)
            };
            if let Some(value) = value {
                doc.insert(field.clone(), value.clone());
            }
        }

        self.stamp(&mut doc, record, live)?;
        Ok(doc)
    }
}
