//! # Versioned Documents
//!
//! Every document of a versioned resource carries a version number that
//! increases by exactly one per accepted write. Each version transition is
//! recorded in a parallel shadow collection, and any past version can be
//! rebuilt from the live document plus that version's single record.
//!
//! Components, leaf first:
//!
//! - `FingerprintEngine`: content fingerprints used as concurrency tokens
//! - `ConcurrencyGate`: If-Match / If-None-Match checks
//! - `VersionResolver`: version number per operation
//! - `FieldDiffEngine`: changed vs. carried versioned fields
//! - `ShadowWriter`: append-only history records
//! - `VersionSynthesizer`: historical document reconstruction
//! - `VersionQueryDispatcher`: latest / specific / all / diffs reads
//! - `VersionedCollection`: the write and read paths wiring the above
//!
//! # Known gap
//!
//! The primary update and the shadow append are two separate single-document
//! writes. If the second fails, the version exists without history and the
//! failure surfaces as `VersioningError::Inconsistent`.

mod collection;
mod diff;
mod dispatcher;
mod errors;
mod fingerprint;
mod gate;
mod resolver;
mod selector;
mod shadow;
mod synthesizer;

pub use collection::{DeleteOutcome, VersionedCollection, WriteOutcome};
pub use diff::{FieldDiff, FieldDiffEngine};
pub use dispatcher::{ReadOutcome, VersionQueryDispatcher};
pub use errors::{VersioningError, VersioningResult};
pub use fingerprint::{normalize_token, FingerprintEngine};
pub use gate::ConcurrencyGate;
pub use resolver::{Operation, Resolution, VersionResolver};
pub use selector::VersionSelector;
pub use shadow::{ShadowRecord, ShadowWrite, ShadowWriter};
pub use synthesizer::VersionSynthesizer;
