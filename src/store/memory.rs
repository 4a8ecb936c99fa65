//! # In-Memory Document Store
//!
//! A `DocumentStore` backed by in-process maps. Every operation takes the
//! collection lock for its whole duration, which gives the single-document
//! atomicity and compare-and-set semantics the trait promises.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use uuid::Uuid;

use crate::document::Document;

use super::backend::{DocumentStore, UpdateGuard, UpdateOutcome};
use super::errors::{StoreError, StoreResult};
use super::filter::Filter;

/// Collection data store
#[derive(Debug, Default, Clone)]
struct CollectionData {
    /// Documents by id
    documents: BTreeMap<String, Document>,

    /// Each entry is the field list of one unique index
    unique_indexes: Vec<Vec<String>>,
}

impl CollectionData {
    /// Index key of `doc`, or `None` if the document lacks an indexed field
    fn index_key(doc: &Document, fields: &[String]) -> Option<Vec<Value>> {
        fields.iter().map(|f| doc.get(f).cloned()).collect()
    }

    /// First unique index `doc` would violate, ignoring document `skip_id`
    fn violated_index(&self, doc: &Document, skip_id: Option<&str>) -> Option<String> {
        for fields in &self.unique_indexes {
            let key = match Self::index_key(doc, fields) {
                Some(key) => key,
                None => continue,
            };
            let taken = self
                .documents
                .iter()
                .filter(|(id, _)| Some(id.as_str()) != skip_id)
                .any(|(_, other)| Self::index_key(other, fields).as_ref() == Some(&key));
            if taken {
                let rendered: Vec<String> = fields
                    .iter()
                    .zip(key.iter())
                    .map(|(f, v)| format!("{}={}", f, v))
                    .collect();
                return Some(rendered.join(","));
            }
        }
        None
    }
}

/// In-memory document store
#[derive(Debug)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, CollectionData>>,
    id_field: String,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store using `_id` as the identity field
    pub fn new() -> Self {
        Self::with_id_field("_id")
    }

    /// Create an empty store with a custom identity field
    pub fn with_id_field(id_field: impl Into<String>) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            id_field: id_field.into(),
        }
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> StoreResult<usize> {
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .map(|c| c.documents.len())
            .unwrap_or(0))
    }

    /// Write a document unconditionally, bypassing indexes.
    ///
    /// Seeds fixtures such as documents written before versioning was
    /// enabled. Not part of the `DocumentStore` contract.
    pub fn put_raw(&self, collection: &str, id: &str, mut document: Document) -> StoreResult<()> {
        document.insert(self.id_field.clone(), Value::String(id.to_string()));
        let mut collections = self.write()?;
        collections
            .entry(collection.to_string())
            .or_default()
            .documents
            .insert(id.to_string(), document);
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<String, CollectionData>>> {
        self.collections
            .read()
            .map_err(|_| StoreError::backend("collection lock poisoned"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<String, CollectionData>>> {
        self.collections
            .write()
            .map_err(|_| StoreError::backend("collection lock poisoned"))
    }
}

impl DocumentStore for InMemoryStore {
    fn find_one(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .and_then(|c| c.documents.get(id))
            .cloned())
    }

    fn find_one_by(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        let collections = self.read()?;
        Ok(collections.get(collection).and_then(|c| {
            c.documents
                .values()
                .find(|doc| filter.matches(doc))
                .cloned()
        }))
    }

    fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .map(|c| {
                c.documents
                    .values()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn insert(&self, collection: &str, mut document: Document) -> StoreResult<String> {
        let id = match document.get(&self.id_field) {
            Some(Value::String(id)) => id.clone(),
            Some(other) => {
                return Err(StoreError::InvalidDocument(format!(
                    "{} must be a string, got {}",
                    self.id_field, other
                )))
            }
            None => {
                let id = Uuid::new_v4().to_string();
                document.insert(self.id_field.clone(), Value::String(id.clone()));
                id
            }
        };

        let mut collections = self.write()?;
        let coll = collections.entry(collection.to_string()).or_default();

        if coll.documents.contains_key(&id) {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                key: format!("{}={}", self.id_field, id),
            });
        }
        if let Some(key) = coll.violated_index(&document, None) {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                key,
            });
        }

        coll.documents.insert(id.clone(), document);
        Ok(id)
    }

    fn conditional_update(
        &self,
        collection: &str,
        id: &str,
        guard: &UpdateGuard,
        mut document: Document,
    ) -> StoreResult<UpdateOutcome> {
        document.insert(self.id_field.clone(), Value::String(id.to_string()));

        let mut collections = self.write()?;
        let coll = match collections.get_mut(collection) {
            Some(coll) => coll,
            None => return Ok(UpdateOutcome::ConflictRejected),
        };

        match coll.documents.get(id) {
            Some(stored) if guard.admits(stored) => {}
            _ => return Ok(UpdateOutcome::ConflictRejected),
        }
        if let Some(key) = coll.violated_index(&document, Some(id)) {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                key,
            });
        }

        coll.documents.insert(id.to_string(), document);
        Ok(UpdateOutcome::Applied)
    }

    fn conditional_remove(
        &self,
        collection: &str,
        id: &str,
        guard: &UpdateGuard,
    ) -> StoreResult<UpdateOutcome> {
        let mut collections = self.write()?;
        let coll = match collections.get_mut(collection) {
            Some(coll) => coll,
            None => return Ok(UpdateOutcome::ConflictRejected),
        };

        let admitted = coll.documents.get(id).map_or(false, |stored| guard.admits(stored));
        if !admitted {
            return Ok(UpdateOutcome::ConflictRejected);
        }
        coll.documents.remove(id);
        Ok(UpdateOutcome::Applied)
    }

    fn remove_many(&self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        let mut collections = self.write()?;
        let coll = match collections.get_mut(collection) {
            Some(coll) => coll,
            None => return Ok(0),
        };

        let before = coll.documents.len();
        coll.documents.retain(|_, doc| !filter.matches(doc));
        Ok(before - coll.documents.len())
    }

    fn ensure_unique_index(&self, collection: &str, fields: &[&str]) -> StoreResult<()> {
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let mut collections = self.write()?;
        let coll = collections.entry(collection.to_string()).or_default();
        if !coll.unique_indexes.contains(&fields) {
            coll.unique_indexes.push(fields);
        }
        Ok(())
    }
}
