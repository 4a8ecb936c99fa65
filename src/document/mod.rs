//! # Documents
//!
//! JSON documents as stored in primary and shadow collections.
//!
//! A document is a flat JSON object at the top level. Field values may be
//! arbitrary JSON; versioning operates on top-level fields only.

mod timestamp;
mod types;

pub use timestamp::{format_timestamp, now, parse_timestamp};
pub use types::Document;
