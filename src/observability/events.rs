//! Observable versioning events
//!
//! Every log line emitted by the versioning subsystem names one of these
//! events. Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Config file loaded and derived
    ConfigLoaded,
    /// Replay command finished its input
    ReplayCompleted,

    // Write path
    /// New document stored with its first version
    DocumentCreated,
    /// Primary document updated to a new version
    VersionCommitted,
    /// First versioned write to a document that predates versioning
    LateVersioningCatch,
    /// Anchor numbered after history retained from an earlier life of the id
    HistoryResumed,
    /// Shadow record appended
    ShadowWritten,
    /// Shadow record append failed after the primary write succeeded
    ShadowWriteFailed,
    /// Shadow record already present and identical; retry absorbed
    ShadowRetryDeduplicated,
    /// Missing or mismatched precondition token
    PreconditionRejected,
    /// Conditional update lost a race with another writer
    ConflictRejected,
    /// Primary document removed
    DocumentDeleted,
    /// Shadow records removed with their document
    ShadowPurged,

    // Read path
    /// Historical version, history, or diffs served
    HistoryRead,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ReplayCompleted => "REPLAY_COMPLETED",

            Event::DocumentCreated => "DOCUMENT_CREATED",
            Event::VersionCommitted => "VERSION_COMMITTED",
            Event::LateVersioningCatch => "LATE_VERSIONING_CATCH",
            Event::HistoryResumed => "HISTORY_RESUMED",
            Event::ShadowWritten => "SHADOW_WRITTEN",
            Event::ShadowWriteFailed => "SHADOW_WRITE_FAILED",
            Event::ShadowRetryDeduplicated => "SHADOW_RETRY_DEDUPLICATED",
            Event::PreconditionRejected => "PRECONDITION_REJECTED",
            Event::ConflictRejected => "CONFLICT_REJECTED",
            Event::DocumentDeleted => "DOCUMENT_DELETED",
            Event::ShadowPurged => "SHADOW_PURGED",

            Event::HistoryRead => "HISTORY_READ",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::ShadowWriteFailed => Severity::Error,
            Event::PreconditionRejected
            | Event::ConflictRejected
            | Event::LateVersioningCatch
            | Event::ShadowRetryDeduplicated => Severity::Warn,
            Event::ShadowWritten | Event::HistoryRead => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::ConfigLoaded,
            Event::ReplayCompleted,
            Event::DocumentCreated,
            Event::VersionCommitted,
            Event::LateVersioningCatch,
            Event::HistoryResumed,
            Event::ShadowWritten,
            Event::ShadowWriteFailed,
            Event::ShadowRetryDeduplicated,
            Event::PreconditionRejected,
            Event::ConflictRejected,
            Event::DocumentDeleted,
            Event::ShadowPurged,
            Event::HistoryRead,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_shadow_failure_is_error() {
        assert_eq!(Event::ShadowWriteFailed.severity(), Severity::Error);
        assert_eq!(Event::ConflictRejected.severity(), Severity::Warn);
        assert_eq!(Event::VersionCommitted.severity(), Severity::Info);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::VersionCommitted), "VERSION_COMMITTED");
    }
}
