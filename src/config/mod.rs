//! Versioning configuration
//!
//! Per-resource settings are declared once, validated at load time, and
//! derived into an immutable `ResourceVersioningConfig` that callers hold
//! and pass by reference into every versioning component.

mod errors;
mod loader;
mod resource;
mod settings;

pub use errors::{ConfigError, ConfigResult};
pub use loader::{ConfigFile, ConfigLoader, ResourceRegistry};
pub use resource::{
    ConcurrencyControl, FieldDecl, ResourceConfig, ResourceVersioningConfig, RetentionPolicy,
    VersionedFields,
};
pub use settings::{MetaFields, VersioningSettings};
