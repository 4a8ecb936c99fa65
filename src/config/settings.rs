//! Global versioning settings
//!
//! Settings shared by every resource: metadata field naming and the
//! concurrency-control switches. Every field has a serde default so an
//! empty `{}` is a valid settings block.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigResult};

/// Names of the system metadata fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFields {
    /// Document identity (default: "_id")
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Version number (default: "_version")
    #[serde(default = "default_version_field")]
    pub version_field: String,

    /// Newest version number, set on reads (default: "_latest_version")
    #[serde(default = "default_latest_version_field")]
    pub latest_version_field: String,

    /// Content fingerprint (default: "_etag")
    #[serde(default = "default_etag_field")]
    pub etag_field: String,

    /// Last write timestamp (default: "_updated")
    #[serde(default = "default_updated_field")]
    pub updated_field: String,

    /// Creation timestamp (default: "_created")
    #[serde(default = "default_created_field")]
    pub created_field: String,

    /// Appended to a resource name to name its shadow collection (default: "_versions")
    #[serde(default = "default_versions_suffix")]
    pub versions_suffix: String,

    /// Appended to the id field to name the back-reference (default: "_document")
    #[serde(default = "default_version_id_suffix")]
    pub version_id_suffix: String,

    /// Shadow record field holding carried-forward values (default: "_carried")
    #[serde(default = "default_carried_field")]
    pub carried_field: String,
}

fn default_id_field() -> String {
    "_id".to_string()
}

fn default_version_field() -> String {
    "_version".to_string()
}

fn default_latest_version_field() -> String {
    "_latest_version".to_string()
}

fn default_etag_field() -> String {
    "_etag".to_string()
}

fn default_updated_field() -> String {
    "_updated".to_string()
}

fn default_created_field() -> String {
    "_created".to_string()
}

fn default_versions_suffix() -> String {
    "_versions".to_string()
}

fn default_version_id_suffix() -> String {
    "_document".to_string()
}

fn default_carried_field() -> String {
    "_carried".to_string()
}

impl Default for MetaFields {
    fn default() -> Self {
        Self {
            id_field: default_id_field(),
            version_field: default_version_field(),
            latest_version_field: default_latest_version_field(),
            etag_field: default_etag_field(),
            updated_field: default_updated_field(),
            created_field: default_created_field(),
            versions_suffix: default_versions_suffix(),
            version_id_suffix: default_version_id_suffix(),
            carried_field: default_carried_field(),
        }
    }
}

impl MetaFields {
    /// Back-reference field in shadow records, e.g. `_id_document`
    pub fn owner_field(&self) -> String {
        format!("{}{}", self.id_field, self.version_id_suffix)
    }

    /// Shadow collection name for a resource, e.g. `people_versions`
    pub fn shadow_collection(&self, resource: &str) -> String {
        format!("{}{}", resource, self.versions_suffix)
    }

    /// Every field name that is metadata rather than content.
    ///
    /// Reserved fields are never versioned and never accepted from clients.
    pub fn reserved(&self) -> BTreeSet<String> {
        [
            self.id_field.clone(),
            self.version_field.clone(),
            self.latest_version_field.clone(),
            self.etag_field.clone(),
            self.updated_field.clone(),
            self.created_field.clone(),
            self.carried_field.clone(),
            self.owner_field(),
        ]
        .into_iter()
        .collect()
    }

    /// Reject empty names and names shared between roles
    pub fn validate(&self) -> ConfigResult<()> {
        let roles: [(&'static str, &str); 7] = [
            ("id", self.id_field.as_str()),
            ("version", self.version_field.as_str()),
            ("latest version", self.latest_version_field.as_str()),
            ("etag", self.etag_field.as_str()),
            ("updated", self.updated_field.as_str()),
            ("created", self.created_field.as_str()),
            ("carried", self.carried_field.as_str()),
        ];

        let mut seen = BTreeSet::new();
        for (role, name) in roles {
            if name.is_empty() {
                return Err(ConfigError::EmptyMetaField(role));
            }
            if !seen.insert(name) {
                return Err(ConfigError::MetaFieldClash(name.to_string()));
            }
        }

        if self.versions_suffix.is_empty() {
            return Err(ConfigError::EmptyMetaField("versions suffix"));
        }
        if self.version_id_suffix.is_empty() {
            return Err(ConfigError::EmptyMetaField("version id suffix"));
        }

        Ok(())
    }
}

/// Settings applied to every resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersioningSettings {
    /// Metadata field naming
    #[serde(default)]
    pub meta: MetaFields,

    /// Check If-Match tokens on mutating operations (default: true)
    #[serde(default = "default_true")]
    pub if_match: bool,

    /// Reject mutating operations that carry no token (default: true)
    #[serde(default = "default_true")]
    pub enforce_if_match: bool,

    /// Fields left out of the fingerprint
    #[serde(default)]
    pub etag_ignore_fields: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for VersioningSettings {
    fn default() -> Self {
        Self {
            meta: MetaFields::default(),
            if_match: true,
            enforce_if_match: true,
            etag_ignore_fields: Vec::new(),
        }
    }
}

impl VersioningSettings {
    /// Concurrency control on, missing tokens accepted
    pub fn lenient() -> Self {
        Self {
            enforce_if_match: false,
            ..Default::default()
        }
    }
}
