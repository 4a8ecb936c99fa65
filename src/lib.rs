//! versadoc - versioned documents over a document store
//!
//! Monotonic per-document version numbers, append-only shadow history,
//! on-demand reconstruction of any past version, and optimistic
//! concurrency on writes, layered over a store that only guarantees
//! single-document atomicity and conditional updates.

pub mod cli;
pub mod config;
pub mod document;
pub mod observability;
pub mod store;
pub mod versioning;
