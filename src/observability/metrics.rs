//! Versioning counters
//!
//! - Counters only, monotonic
//! - Reset only on process start
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for one versioned collection (or shared across several)
///
/// Relaxed ordering: counters are independent and only read for reporting.
#[derive(Debug, Default)]
pub struct VersioningMetrics {
    documents_created: AtomicU64,
    versions_committed: AtomicU64,
    shadow_records_written: AtomicU64,
    shadow_write_failures: AtomicU64,
    precondition_rejections: AtomicU64,
    conflict_rejections: AtomicU64,
    historical_reads: AtomicU64,
    documents_deleted: AtomicU64,
}

impl VersioningMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_documents_created(&self) {
        self.documents_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_versions_committed(&self) {
        self.versions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_shadow_records(&self) {
        self.shadow_records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_shadow_failures(&self) {
        self.shadow_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_precondition_rejections(&self) {
        self.precondition_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_conflict_rejections(&self) {
        self.conflict_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_historical_reads(&self) {
        self.historical_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_documents_deleted(&self) {
        self.documents_deleted.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_created: self.documents_created.load(Ordering::Relaxed),
            versions_committed: self.versions_committed.load(Ordering::Relaxed),
            shadow_records_written: self.shadow_records_written.load(Ordering::Relaxed),
            shadow_write_failures: self.shadow_write_failures.load(Ordering::Relaxed),
            precondition_rejections: self.precondition_rejections.load(Ordering::Relaxed),
            conflict_rejections: self.conflict_rejections.load(Ordering::Relaxed),
            historical_reads: self.historical_reads.load(Ordering::Relaxed),
            documents_deleted: self.documents_deleted.load(Ordering::Relaxed),
        }
    }

    /// Current counters as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or(serde_json::Value::Null)
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub documents_created: u64,
    pub versions_committed: u64,
    pub shadow_records_written: u64,
    pub shadow_write_failures: u64,
    pub precondition_rejections: u64,
    pub conflict_rejections: u64,
    pub historical_reads: u64,
    pub documents_deleted: u64,
}
