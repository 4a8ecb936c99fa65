//! # Version Query Dispatcher
//!
//! Turns a resolved live document and a `VersionSelector` into the
//! document(s) a read returns.

use crate::config::ResourceVersioningConfig;
use crate::document::Document;
use crate::store::DocumentStore;

use super::errors::{VersioningError, VersioningResult};
use super::fingerprint::FingerprintEngine;
use super::gate::ConcurrencyGate;
use super::resolver::VersionResolver;
use super::selector::VersionSelector;
use super::shadow::{ShadowRecord, ShadowWriter};
use super::synthesizer::VersionSynthesizer;

/// Result of a read
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// A single document (live or synthesized) with its fingerprint
    Document { document: Document, fingerprint: String },
    /// Every version as a full document, ascending
    History(Vec<Document>),
    /// Version 1 in full, later versions as diff entries, ascending
    Diffs(Vec<Document>),
    /// The caller's If-None-Match token matched
    NotModified { fingerprint: String },
}

impl ReadOutcome {
    /// The single document, if this outcome carries exactly one
    pub fn document(&self) -> Option<&Document> {
        match self {
            ReadOutcome::Document { document, .. } => Some(document),
            _ => None,
        }
    }

    /// Every document carried by this outcome
    pub fn documents(&self) -> Vec<&Document> {
        match self {
            ReadOutcome::Document { document, .. } => vec![document],
            ReadOutcome::History(docs) | ReadOutcome::Diffs(docs) => docs.iter().collect(),
            ReadOutcome::NotModified { .. } => Vec::new(),
        }
    }
}

pub struct VersionQueryDispatcher<'a, S: DocumentStore + ?Sized> {
    config: &'a ResourceVersioningConfig,
    shadows: ShadowWriter<'a, S>,
}

impl<'a, S: DocumentStore + ?Sized> VersionQueryDispatcher<'a, S> {
    pub fn new(store: &'a S, config: &'a ResourceVersioningConfig) -> Self {
        Self {
            config,
            shadows: ShadowWriter::new(store, config),
        }
    }

    /// Answer `selector` for `live`, which must already carry its resolved
    /// version metadata.
    pub fn dispatch(
        &self,
        live: &Document,
        selector: VersionSelector,
        if_none_match: Option<&str>,
    ) -> VersioningResult<ReadOutcome> {
        let selector = if self.config.versioning_enabled() {
            selector
        } else {
            VersionSelector::Latest
        };

        match selector {
            VersionSelector::Latest => Ok(self.single(live.clone(), if_none_match)),
            VersionSelector::Specific(version) => {
                let document = self.specific(live, version)?;
                Ok(self.single(document, if_none_match))
            }
            VersionSelector::All => {
                let synth = VersionSynthesizer::new(self.config);
                let docs = self
                    .records(live)?
                    .iter()
                    .map(|record| synth.synthesize(live, record))
                    .collect::<VersioningResult<Vec<_>>>()?;
                Ok(ReadOutcome::History(docs))
            }
            VersionSelector::Diffs => {
                let synth = VersionSynthesizer::new(self.config);
                let docs = self
                    .records(live)?
                    .iter()
                    .map(|record| {
                        if record.version == 1 {
                            synth.synthesize(live, record)
                        } else {
                            synth.diff_entry(live, record)
                        }
                    })
                    .collect::<VersioningResult<Vec<_>>>()?;
                Ok(ReadOutcome::Diffs(docs))
            }
        }
    }

    fn single(&self, mut document: Document, if_none_match: Option<&str>) -> ReadOutcome {
        let fingerprint = FingerprintEngine::for_resource(self.config).compute(&document);
        if ConcurrencyGate::not_modified(&fingerprint, if_none_match) {
            return ReadOutcome::NotModified { fingerprint };
        }
        document.insert(
            self.config.meta().etag_field.clone(),
            serde_json::Value::String(fingerprint.clone()),
        );
        ReadOutcome::Document {
            document,
            fingerprint,
        }
    }

    fn owner_id<'d>(&self, live: &'d Document) -> VersioningResult<&'d str> {
        live.get_str(&self.config.meta().id_field)
            .ok_or_else(|| VersioningError::inconsistent("live document has no id"))
    }

    fn latest(&self, live: &Document) -> VersioningResult<u64> {
        Ok(VersionResolver::new(self.config)
            .current_version(live)?
            .unwrap_or(0))
    }

    fn specific(&self, live: &Document, version: u64) -> VersioningResult<Document> {
        let id = self.owner_id(live)?;
        let latest = self.latest(live)?;
        if version > latest {
            return Err(VersioningError::VersionNotFound {
                id: id.to_string(),
                version,
            });
        }

        let record = self.shadows.lookup(id, version)?.ok_or_else(|| {
            VersioningError::inconsistent(format!(
                "{} is at version {} but has no record for version {}",
                id, latest, version
            ))
        })?;
        VersionSynthesizer::new(self.config).synthesize(live, &record)
    }

    /// Records 1..=latest, failing on any gap
    fn records(&self, live: &Document) -> VersioningResult<Vec<ShadowRecord>> {
        let id = self.owner_id(live)?;
        let latest = self.latest(live)?;

        let records: Vec<ShadowRecord> = self
            .shadows
            .history(id)?
            .into_iter()
            .filter(|r| r.version <= latest)
            .collect();

        let contiguous = records
            .iter()
            .enumerate()
            .all(|(i, r)| r.version == i as u64 + 1);
        if !contiguous || records.len() as u64 != latest {
            return Err(VersioningError::inconsistent(format!(
                "{} is at version {} but history holds {} record(s)",
                id,
                latest,
                records.len()
            )));
        }

        Ok(records)
    }
}
