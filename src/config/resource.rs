//! Per-resource versioning configuration
//!
//! `ResourceConfig` is the declarative, serde-friendly form read from a
//! config file. `ResourceVersioningConfig` is the immutable form the
//! versioning components consume: derived once per resource and passed by
//! reference into every call.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::document::Document;

use super::errors::{ConfigError, ConfigResult};
use super::settings::{MetaFields, VersioningSettings};

/// A field declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,

    /// Whether changes to this field are kept in history (default: true)
    #[serde(default = "default_versioned")]
    pub versioned: bool,
}

fn default_versioned() -> bool {
    true
}

impl FieldDecl {
    pub fn versioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versioned: true,
        }
    }

    pub fn unversioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versioned: false,
        }
    }
}

/// What happens to shadow records when their document is deleted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// History outlives the document
    #[default]
    Keep,
    /// History is removed together with the document
    Purge,
}

/// Declarative resource configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource (primary collection) name
    pub name: String,

    /// Keep version history for this resource
    #[serde(default)]
    pub versioning: bool,

    /// Field declarations. Undeclared fields are versioned.
    #[serde(default)]
    pub fields: Vec<FieldDecl>,

    /// Fields always included in `diffs` entries when present
    #[serde(default)]
    pub diff_include: Vec<String>,

    #[serde(default)]
    pub retention: RetentionPolicy,

    /// Shadow collection name override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_source: Option<String>,
}

impl ResourceConfig {
    /// A resource with versioning on and no field declarations
    pub fn versioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versioning: true,
            fields: Vec::new(),
            diff_include: Vec::new(),
            retention: RetentionPolicy::Keep,
            shadow_source: None,
        }
    }

    /// A resource with versioning off
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self {
            versioning: false,
            ..Self::versioned(name)
        }
    }

    pub fn with_field(mut self, decl: FieldDecl) -> Self {
        self.fields.push(decl);
        self
    }

    pub fn with_diff_include(mut self, field: impl Into<String>) -> Self {
        self.diff_include.push(field.into());
        self
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }
}

/// The set of fields whose values are kept in history.
///
/// Membership is by exclusion: a field is versioned unless it is metadata
/// or was declared with `versioned: false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedFields {
    excluded: BTreeSet<String>,
    reserved: BTreeSet<String>,
}

impl VersionedFields {
    pub fn new(excluded: BTreeSet<String>, reserved: BTreeSet<String>) -> Self {
        Self { excluded, reserved }
    }

    /// Whether `field` is versioned
    pub fn contains(&self, field: &str) -> bool {
        !self.reserved.contains(field) && !self.excluded.contains(field)
    }

    /// Fields explicitly declared non-versioned
    pub fn excluded(&self) -> impl Iterator<Item = &str> {
        self.excluded.iter().map(String::as_str)
    }

    /// Copy of `doc` restricted to versioned fields
    pub fn project(&self, doc: &Document) -> Document {
        doc.fields()
            .filter(|(field, _)| self.contains(field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }
}

/// Concurrency-control switches for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyControl {
    pub if_match: bool,
    pub enforce_if_match: bool,
}

/// Immutable, precomputed versioning configuration for one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceVersioningConfig {
    name: String,
    versioning: bool,
    versioned_fields: VersionedFields,
    meta: MetaFields,
    shadow_collection: String,
    owner_field: String,
    diff_include: Vec<String>,
    retention: RetentionPolicy,
    concurrency: ConcurrencyControl,
    etag_ignore: BTreeSet<String>,
}

impl ResourceVersioningConfig {
    /// Derive the immutable configuration, validating declarations
    pub fn build(resource: &ResourceConfig, settings: &VersioningSettings) -> ConfigResult<Self> {
        if resource.name.trim().is_empty() {
            return Err(ConfigError::EmptyResourceName);
        }
        settings.meta.validate()?;

        let reserved = settings.meta.reserved();
        let mut declared = BTreeSet::new();
        let mut excluded = BTreeSet::new();

        for decl in &resource.fields {
            if reserved.contains(&decl.name) {
                return Err(ConfigError::ReservedField {
                    resource: resource.name.clone(),
                    field: decl.name.clone(),
                });
            }
            if !declared.insert(decl.name.clone()) {
                return Err(ConfigError::DuplicateField {
                    resource: resource.name.clone(),
                    field: decl.name.clone(),
                });
            }
            if !decl.versioned {
                excluded.insert(decl.name.clone());
            }
        }

        let mut etag_ignore: BTreeSet<String> =
            settings.etag_ignore_fields.iter().cloned().collect();
        etag_ignore.insert(settings.meta.etag_field.clone());
        etag_ignore.insert(settings.meta.latest_version_field.clone());

        let shadow_collection = resource
            .shadow_source
            .clone()
            .unwrap_or_else(|| settings.meta.shadow_collection(&resource.name));

        Ok(Self {
            name: resource.name.clone(),
            versioning: resource.versioning,
            versioned_fields: VersionedFields::new(excluded, reserved),
            owner_field: settings.meta.owner_field(),
            meta: settings.meta.clone(),
            shadow_collection,
            diff_include: resource.diff_include.clone(),
            retention: resource.retention,
            concurrency: ConcurrencyControl {
                if_match: settings.if_match,
                enforce_if_match: settings.enforce_if_match,
            },
            etag_ignore,
        })
    }

    /// Resource (primary collection) name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn versioning_enabled(&self) -> bool {
        self.versioning
    }

    pub fn versioned_fields(&self) -> &VersionedFields {
        &self.versioned_fields
    }

    pub fn meta(&self) -> &MetaFields {
        &self.meta
    }

    /// Parallel collection holding shadow records
    pub fn shadow_collection(&self) -> &str {
        &self.shadow_collection
    }

    /// Back-reference field in shadow records
    pub fn owner_field(&self) -> &str {
        &self.owner_field
    }

    pub fn diff_include(&self) -> &[String] {
        &self.diff_include
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    pub fn concurrency(&self) -> ConcurrencyControl {
        self.concurrency
    }

    /// Fields the fingerprint does not cover
    pub fn etag_ignore(&self) -> &BTreeSet<String> {
        &self.etag_ignore
    }

    /// Summary used by `versadoc check`
    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "resource": self.name,
            "versioning": self.versioning,
            "shadow_collection": self.shadow_collection,
            "owner_field": self.owner_field,
            "unversioned_fields": self.versioned_fields.excluded().collect::<Vec<_>>(),
            "diff_include": self.diff_include,
            "retention": self.retention,
            "if_match": self.concurrency.if_match,
            "enforce_if_match": self.concurrency.enforce_if_match,
        })
    }
}
