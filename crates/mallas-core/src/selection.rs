//! Remembers which curriculum the user had open last.

use std::sync::Arc;

use tracing::warn;

use crate::models::CurriculumId;
use crate::storage::KeyValueStore;

/// Store key holding the last selected curriculum id.
pub const LAST_SELECTION_KEY: &str = "last_selected_curriculum";

#[derive(Clone)]
pub struct LastSelection {
    store: Arc<dyn KeyValueStore>,
}

impl LastSelection {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn get(&self) -> Option<CurriculumId> {
        match self.store.get(LAST_SELECTION_KEY) {
            Ok(raw) => raw.and_then(|id| CurriculumId::parse(&id).ok()),
            Err(e) => {
                warn!(error = %e, "Failed to read last selected curriculum");
                None
            }
        }
    }

    pub fn set(&self, id: &CurriculumId) {
        if let Err(e) = self.store.set(LAST_SELECTION_KEY, id.as_str()) {
            warn!(curriculum = %id, error = %e, "Failed to remember selected curriculum");
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(LAST_SELECTION_KEY) {
            warn!(error = %e, "Failed to clear last selected curriculum");
        }
    }
}
