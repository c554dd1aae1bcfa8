//! Curriculum catalog discovery.
//!
//! This module provides the `CatalogLoader`, which reads the published
//! index, fetches every listed curriculum document, and keeps an ordered
//! snapshot of the ones that describe themselves properly. It also fetches
//! individual curriculum bodies on demand.

pub mod loader;

pub use loader::{CatalogLoader, CatalogSnapshot, INDEX_PATH};

use serde::Serialize;

use crate::models::CatalogEntry;

/// Something that went wrong while building a catalog. None of these stop
/// a load; they are recorded so callers can show them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CatalogIssue {
    /// The index was missing or malformed; no candidates were tried.
    IndexUnavailable(String),
    /// One listed document was skipped.
    ItemSkipped { file: String, reason: String },
    /// The load failed outright and the catalog was reset to empty.
    Aborted(String),
}

/// Curricula ordered by code, plus what went wrong building them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    issues: Vec<CatalogIssue>,
}

impl Catalog {
    pub(crate) fn new(entries: Vec<CatalogEntry>, issues: Vec<CatalogIssue>) -> Self {
        Self { entries, issues }
    }

    pub(crate) fn aborted(reason: String) -> Self {
        Self {
            entries: Vec::new(),
            issues: vec![CatalogIssue::Aborted(reason)],
        }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn issues(&self) -> &[CatalogIssue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }
}
