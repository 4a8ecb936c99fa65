//! Configuration errors
//!
//! Configuration problems are detected when a resource is loaded, never
//! during a request.

use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Resource name is empty
    #[error("Resource name must not be empty")]
    EmptyResourceName,

    /// Same resource declared twice
    #[error("Duplicate resource: {0}")]
    DuplicateResource(String),

    /// Same field declared twice within a resource
    #[error("Duplicate field '{field}' in resource '{resource}'")]
    DuplicateField { resource: String, field: String },

    /// Field declaration collides with a system metadata field
    #[error("Field '{field}' in resource '{resource}' is reserved for metadata")]
    ReservedField { resource: String, field: String },

    /// A resource is named after a shadow collection
    #[error("Resource '{resource}' uses the shadow collection of '{owner}'")]
    ShadowCollectionClash { resource: String, owner: String },

    /// Two metadata roles share a name
    #[error("Metadata field name '{0}' is used for more than one role")]
    MetaFieldClash(String),

    /// Metadata field name is empty
    #[error("Metadata field name for {0} must not be empty")]
    EmptyMetaField(&'static str),

    /// Config file could not be read
    #[error("Failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    /// Config file is not valid JSON for the expected shape
    #[error("Invalid config {path}: {reason}")]
    Malformed { path: String, reason: String },
}

impl ConfigError {
    /// Get error code string
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::EmptyResourceName => "CONFIG_EMPTY_RESOURCE_NAME",
            ConfigError::DuplicateResource(_) => "CONFIG_DUPLICATE_RESOURCE",
            ConfigError::DuplicateField { .. } => "CONFIG_DUPLICATE_FIELD",
            ConfigError::ReservedField { .. } => "CONFIG_RESERVED_FIELD",
            ConfigError::ShadowCollectionClash { .. } => "CONFIG_SHADOW_COLLECTION_CLASH",
            ConfigError::MetaFieldClash(_) => "CONFIG_META_FIELD_CLASH",
            ConfigError::EmptyMetaField(_) => "CONFIG_EMPTY_META_FIELD",
            ConfigError::Read { .. } => "CONFIG_READ_FAILED",
            ConfigError::Malformed { .. } => "CONFIG_MALFORMED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_resource_and_field() {
        let err = ConfigError::ReservedField {
            resource: "people".into(),
            field: "_etag".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("people"));
        assert!(msg.contains("_etag"));
        assert_eq!(err.code(), "CONFIG_RESERVED_FIELD");
    }
}
