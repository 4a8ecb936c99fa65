//! # Field Diff Engine
//!
//! Splits a document's versioned fields into those that changed relative to
//! the previous full state and those carried forward unchanged. Anchors
//! (version 1, or the late versioning catch) report every versioned field
//! as changed.
//!
//! Fields present in the previous state but absent from the new one appear
//! in neither part; the union of both parts is the complete versioned state.

use chrono::{DateTime, Utc};

use crate::config::VersionedFields;
use crate::document::Document;

/// Versioned-field delta for one version transition
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDiff {
    /// Added or changed versioned fields (every versioned field for anchors)
    pub changed: Document,
    /// Versioned fields equal to the previous state
    pub carried: Document,
    pub anchor: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDiffEngine<'a> {
    fields: &'a VersionedFields,
}

impl<'a> FieldDiffEngine<'a> {
    pub fn new(fields: &'a VersionedFields) -> Self {
        Self { fields }
    }

    pub fn diff(
        &self,
        previous: Option<&Document>,
        current: &Document,
        anchor: bool,
        updated_at: DateTime<Utc>,
    ) -> FieldDiff {
        let mut changed = Document::new();
        let mut carried = Document::new();

        for (field, value) in current.fields() {
            if !self.fields.contains(field) {
                continue;
            }
            let unchanged = !anchor && previous.and_then(|p| p.get(field)) == Some(value);
            if unchanged {
                carried.insert(field.clone(), value.clone());
            } else {
                changed.insert(field.clone(), value.clone());
            }
        }

        FieldDiff {
            changed,
            carried,
            anchor,
            updated_at,
        }
    }
}
