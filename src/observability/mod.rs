//! Observability for the versioning subsystem
//!
//! - Structured logging (JSON lines on stderr)
//! - Typed events
//! - Lock-free counters
//!
//! Observability is read-only: it never changes the outcome of an
//! operation, and a failure to log is ignored.
//!
//! # Usage
//!
//! ```ignore
//! use versadoc::observability::{log_event_with_fields, Event, VersioningMetrics};
//!
//! log_event_with_fields(Event::VersionCommitted, &[("resource", "people"), ("version", "3")]);
//!
//! let metrics = VersioningMetrics::new();
//! metrics.increment_versions_committed();
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsSnapshot, VersioningMetrics};

/// Log an event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
