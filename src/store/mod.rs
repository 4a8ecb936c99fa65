//! # Document Store
//!
//! The document store is an external collaborator: this crate layers
//! versioning on top of it and never implements storage itself. The trait
//! captures exactly what that layering needs; `InMemoryStore` is a complete
//! reference backend used by tests and the CLI.

mod backend;
mod errors;
mod filter;
mod memory;

pub use backend::{DocumentStore, UpdateGuard, UpdateOutcome};
pub use errors::{StoreError, StoreResult};
pub use filter::{Filter, FilterExpr};
pub use memory::InMemoryStore;
