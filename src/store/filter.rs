//! # Store Filters
//!
//! Conjunctions of field-equality conditions, the only lookup shape the
//! versioning layer needs (`owner_id = X AND version = N`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;

/// A single `field == value` condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterExpr {
    /// Field to filter on
    pub field: String,

    /// Value the field must equal
    pub value: Value,
}

impl FilterExpr {
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }

    /// Check if a document matches this condition. Absent fields never match.
    pub fn matches(&self, doc: &Document) -> bool {
        doc.get(&self.field) == Some(&self.value)
    }
}

/// All conditions must hold
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub conditions: Vec<FilterExpr>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition
    pub fn eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.conditions.push(FilterExpr::eq(field, value));
        self
    }

    /// The empty filter matches every document
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }
}
