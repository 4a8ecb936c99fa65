//! # Version Resolver
//!
//! Decides the version number a document carries after each operation.
//!
//! | Operation | Prior state          | Result                               |
//! |-----------|----------------------|--------------------------------------|
//! | create    | -                    | version 1 (anchor)                   |
//! | read      | no version field     | version 0, latest 0 (not persisted)  |
//! | update    | version V            | version V + 1                        |
//! | update    | no version / 0       | version 1, late versioning catch     |
//!
//! An anchor (create or late catch) for an id whose earlier life left
//! history behind resumes numbering after the last retained version.
//!
//! With versioning disabled the resolver attaches nothing.

use serde_json::Value;

use crate::config::ResourceVersioningConfig;
use crate::document::Document;

use super::errors::{VersioningError, VersioningResult};

/// Operation kind driving a resolution
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Create,
    /// `prior` is the item the read is relative to, when it differs from
    /// the document being resolved (e.g. entries of a version list)
    Read { prior: Option<&'a Document> },
    Update { prior: Option<&'a Document> },
}

/// Version metadata to attach to a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub version: u64,
    pub latest_version: u64,
    /// First update of a document that predates versioning
    pub late_catch: bool,
    /// The shadow record for this version must be a full snapshot
    pub anchor: bool,
}

impl Resolution {
    pub fn is_anchor(&self) -> bool {
        self.anchor
    }

    /// Continue an anchor's numbering after `last_retained`
    pub fn resume_after(&mut self, last_retained: u64) {
        self.version = last_retained + 1;
        self.latest_version = self.version;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VersionResolver<'a> {
    config: &'a ResourceVersioningConfig,
}

impl<'a> VersionResolver<'a> {
    pub fn new(config: &'a ResourceVersioningConfig) -> Self {
        Self { config }
    }

    /// Stored version of `doc`. `None` when the field is absent.
    pub fn current_version(&self, doc: &Document) -> VersioningResult<Option<u64>> {
        let field = &self.config.meta().version_field;
        match doc.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                VersioningError::inconsistent(format!(
                    "{} holds non-integer {} {}",
                    self.config.name(),
                    field,
                    value
                ))
            }),
        }
    }

    /// Resolve the version for `op` applied to `doc`.
    ///
    /// Returns `None` when versioning is disabled for the resource.
    pub fn resolve(&self, op: Operation<'_>, doc: &Document) -> VersioningResult<Option<Resolution>> {
        if !self.config.versioning_enabled() {
            return Ok(None);
        }

        let resolution = match op {
            Operation::Create => Resolution {
                version: 1,
                latest_version: 1,
                late_catch: false,
                anchor: true,
            },
            Operation::Read { prior } => {
                let version = self.current_version(doc)?.unwrap_or(0);
                let latest_version = match prior {
                    Some(prior) => self.current_version(prior)?.unwrap_or(0),
                    None => version,
                };
                Resolution {
                    version,
                    latest_version,
                    late_catch: false,
                    anchor: false,
                }
            }
            Operation::Update { prior } => {
                let prior = prior.ok_or_else(|| VersioningError::DocumentNotFound {
                    resource: self.config.name().to_string(),
                    id: doc
                        .get_str(&self.config.meta().id_field)
                        .unwrap_or_default()
                        .to_string(),
                })?;
                let previous = self.current_version(prior)?.unwrap_or(0);
                let version = previous + 1;
                Resolution {
                    version,
                    latest_version: version,
                    late_catch: previous == 0,
                    anchor: previous == 0,
                }
            }
        };

        Ok(Some(resolution))
    }

    /// Write the resolved version and latest version onto `doc`
    pub fn apply(&self, resolution: &Resolution, doc: &mut Document) {
        let meta = self.config.meta();
        doc.insert(meta.version_field.clone(), Value::from(resolution.version));
        doc.insert(
            meta.latest_version_field.clone(),
            Value::from(resolution.latest_version),
        );
    }
}
