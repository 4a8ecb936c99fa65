//! Shared fixtures for integration tests
//!
//! - `collection` / `collection_on`: a versioned collection over a store
//! - `FaultyStore`: fails shadow-record inserts on demand
//! - `RacingStore`: lets another writer win the next conditional update

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use versadoc::config::{ResourceConfig, ResourceVersioningConfig, VersioningSettings};
use versadoc::document::Document;
use versadoc::observability::VersioningMetrics;
use versadoc::store::{
    DocumentStore, Filter, InMemoryStore, StoreError, StoreResult, UpdateGuard, UpdateOutcome,
};
use versadoc::versioning::{ReadOutcome, VersionSelector, VersionedCollection};

pub fn doc(value: Value) -> Document {
    Document::from_value(value).expect("test documents are objects")
}

pub fn derive(resource: ResourceConfig, settings: &VersioningSettings) -> Arc<ResourceVersioningConfig> {
    Arc::new(ResourceVersioningConfig::build(&resource, settings).expect("valid test config"))
}

/// A collection over an existing store
pub fn collection_on<S: DocumentStore>(
    store: Arc<S>,
    resource: ResourceConfig,
    settings: &VersioningSettings,
) -> VersionedCollection<S> {
    VersionedCollection::new(store, derive(resource, settings), Arc::new(VersioningMetrics::new()))
        .expect("collection binds")
}

/// A collection over a fresh in-memory store, default settings
pub fn collection(resource: ResourceConfig) -> VersionedCollection<InMemoryStore> {
    collection_on(
        Arc::new(InMemoryStore::new()),
        resource,
        &VersioningSettings::default(),
    )
}

/// The single document of a read, panicking on any other outcome
pub fn read_one<S: DocumentStore>(
    collection: &VersionedCollection<S>,
    id: &str,
    selector: VersionSelector,
) -> Document {
    match collection.read(id, selector, None).expect("read succeeds") {
        ReadOutcome::Document { document, .. } => document,
        other => panic!("expected a single document, got {:?}", other),
    }
}

/// Every document of a history or diffs read
pub fn read_many<S: DocumentStore>(
    collection: &VersionedCollection<S>,
    id: &str,
    selector: VersionSelector,
) -> Vec<Document> {
    match collection.read(id, selector, None).expect("read succeeds") {
        ReadOutcome::History(docs) | ReadOutcome::Diffs(docs) => docs,
        other => panic!("expected several documents, got {:?}", other),
    }
}

/// Versioned content of `doc`: everything except underscore metadata
pub fn content(doc: &Document) -> Value {
    let mut copy = doc.clone();
    copy.retain(|field, _| !field.starts_with('_'));
    copy.into_value()
}

pub fn version_of(doc: &Document) -> Value {
    doc.get("_version").cloned().unwrap_or(json!(null))
}

// =============================================================================
// Fault injection
// =============================================================================

/// In-memory store whose inserts into shadow collections can be made to fail
#[derive(Default)]
pub struct FaultyStore {
    pub inner: InMemoryStore,
    fail_shadow_inserts: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_shadow_inserts(&self, fail: bool) {
        self.fail_shadow_inserts.store(fail, Ordering::SeqCst);
    }
}

impl DocumentStore for FaultyStore {
    fn find_one(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.inner.find_one(collection, id)
    }

    fn find_one_by(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        self.inner.find_one_by(collection, filter)
    }

    fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        self.inner.find(collection, filter)
    }

    fn insert(&self, collection: &str, document: Document) -> StoreResult<String> {
        if collection.ends_with("_versions") && self.fail_shadow_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::backend("injected shadow insert failure"));
        }
        self.inner.insert(collection, document)
    }

    fn conditional_update(
        &self,
        collection: &str,
        id: &str,
        guard: &UpdateGuard,
        document: Document,
    ) -> StoreResult<UpdateOutcome> {
        self.inner.conditional_update(collection, id, guard, document)
    }

    fn conditional_remove(
        &self,
        collection: &str,
        id: &str,
        guard: &UpdateGuard,
    ) -> StoreResult<UpdateOutcome> {
        self.inner.conditional_remove(collection, id, guard)
    }

    fn remove_many(&self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        self.inner.remove_many(collection, filter)
    }

    fn ensure_unique_index(&self, collection: &str, fields: &[&str]) -> StoreResult<()> {
        self.inner.ensure_unique_index(collection, fields)
    }
}

/// In-memory store where another writer can slip in between a caller's
/// read and its conditional update
#[derive(Default)]
pub struct RacingStore {
    pub inner: InMemoryStore,
    intrude: AtomicBool,
}

impl RacingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next conditional write lose to a concurrent writer
    pub fn intrude_once(&self) {
        self.intrude.store(true, Ordering::SeqCst);
    }

    fn concurrent_write(&self, collection: &str, id: &str) {
        if !self.intrude.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Ok(Some(mut current)) = self.inner.find_one(collection, id) {
            current.insert("_etag", json!("concurrent-writer"));
            current.insert("intruder", json!(true));
            self.inner
                .put_raw(collection, id, current)
                .expect("concurrent write lands");
        }
    }
}

impl DocumentStore for RacingStore {
    fn find_one(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.inner.find_one(collection, id)
    }

    fn find_one_by(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        self.inner.find_one_by(collection, filter)
    }

    fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        self.inner.find(collection, filter)
    }

    fn insert(&self, collection: &str, document: Document) -> StoreResult<String> {
        self.inner.insert(collection, document)
    }

    fn conditional_update(
        &self,
        collection: &str,
        id: &str,
        guard: &UpdateGuard,
        document: Document,
    ) -> StoreResult<UpdateOutcome> {
        self.concurrent_write(collection, id);
        self.inner.conditional_update(collection, id, guard, document)
    }

    fn conditional_remove(
        &self,
        collection: &str,
        id: &str,
        guard: &UpdateGuard,
    ) -> StoreResult<UpdateOutcome> {
        self.concurrent_write(collection, id);
        self.inner.conditional_remove(collection, id, guard)
    }

    fn remove_many(&self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        self.inner.remove_many(collection, filter)
    }

    fn ensure_unique_index(&self, collection: &str, fields: &[&str]) -> StoreResult<()> {
        self.inner.ensure_unique_index(collection, fields)
    }
}
