//! Config file loader
//!
//! A config file is a single JSON object:
//!
//! ```json
//! {
//!   "settings": { "if_match": true, "meta": { "id_field": "_id" } },
//!   "resources": [
//!     { "name": "people", "versioning": true,
//!       "fields": [ { "name": "score", "versioned": false } ] }
//!   ]
//! }
//! ```
//!
//! Every resource is validated and derived at load time. A bad file fails
//! as a whole; nothing is partially registered.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::observability::{log_event_with_fields, Event};

use super::errors::{ConfigError, ConfigResult};
use super::resource::{ResourceConfig, ResourceVersioningConfig};
use super::settings::VersioningSettings;

/// On-disk configuration shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub settings: VersioningSettings,

    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

/// Derived configurations indexed by resource name
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    settings: VersioningSettings,
    resources: BTreeMap<String, Arc<ResourceVersioningConfig>>,
}

impl ResourceRegistry {
    /// Derive every resource of a config file
    pub fn build(file: &ConfigFile) -> ConfigResult<Self> {
        let mut resources = BTreeMap::new();

        for resource in &file.resources {
            let derived = ResourceVersioningConfig::build(resource, &file.settings)?;
            if resources.contains_key(derived.name()) {
                return Err(ConfigError::DuplicateResource(derived.name().to_string()));
            }
            resources.insert(derived.name().to_string(), Arc::new(derived));
        }

        // shadow collections are written only through their owner
        for owner in resources.values() {
            if resources.contains_key(owner.shadow_collection()) {
                return Err(ConfigError::ShadowCollectionClash {
                    resource: owner.shadow_collection().to_string(),
                    owner: owner.name().to_string(),
                });
            }
        }

        Ok(Self {
            settings: file.settings.clone(),
            resources,
        })
    }

    /// Settings shared by every resource
    pub fn settings(&self) -> &VersioningSettings {
        &self.settings
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResourceVersioningConfig>> {
        self.resources.get(name).cloned()
    }

    /// Resource names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ResourceVersioningConfig>> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Loads config files into a `ResourceRegistry`
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and derive a config file from disk
    pub fn load(path: &Path) -> ConfigResult<ResourceRegistry> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let registry = Self::from_json(&content).map_err(|e| match e {
            ConfigError::Malformed { reason, .. } => ConfigError::Malformed {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })?;

        let shown = path.display().to_string();
        let count = registry.len().to_string();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[("path", shown.as_str()), ("resources", count.as_str())],
        );

        Ok(registry)
    }

    /// Parse and derive config JSON held in memory
    pub fn from_json(content: &str) -> ConfigResult<ResourceRegistry> {
        let file: ConfigFile =
            serde_json::from_str(content).map_err(|e| ConfigError::Malformed {
                path: "<in-memory>".to_string(),
                reason: e.to_string(),
            })?;

        ResourceRegistry::build(&file)
    }
}
