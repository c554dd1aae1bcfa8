//! The user-built curriculum, kept in the key/value store.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::storage::{probe_capacity, KeyValueStore, StoreError};

/// Store key holding the custom curriculum body.
pub const CUSTOM_CURRICULUM_KEY: &str = "custom_curriculum_data";

#[derive(Clone)]
pub struct CustomCurriculum {
    store: Arc<dyn KeyValueStore>,
}

impl CustomCurriculum {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Starting body offered when nothing has been saved: one level with a
    /// single placeholder course and no prerequisites.
    pub fn default_body() -> Value {
        json!({
            "n1": [
                ["MATERIA DE EJEMPLO", "XXXXX", []]
            ]
        })
    }

    pub fn save(&self, body: &Value) -> Result<(), StoreError> {
        if !probe_capacity(self.store.as_ref()) {
            return Err(StoreError::Unavailable(
                "cannot save custom curriculum".to_string(),
            ));
        }
        let encoded = serde_json::to_string(body)?;
        self.store.set(CUSTOM_CURRICULUM_KEY, &encoded)?;
        info!("Saved custom curriculum");
        Ok(())
    }

    /// The saved body if it exists and decodes.
    pub fn stored(&self) -> Option<Value> {
        let raw = match self.store.get(CUSTOM_CURRICULUM_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read custom curriculum");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(error = %e, "Saved custom curriculum is not valid JSON");
                None
            }
        }
    }

    /// The saved body, or the default body when none is usable.
    pub fn load(&self) -> Value {
        self.stored().unwrap_or_else(|| {
            debug!("No custom curriculum saved, using default body");
            Self::default_body()
        })
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(CUSTOM_CURRICULUM_KEY) {
            warn!(error = %e, "Failed to clear custom curriculum");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_load_defaults_when_missing_or_corrupt() {
        let store = Arc::new(MemoryStore::new());
        let custom = CustomCurriculum::new(store.clone());
        assert_eq!(custom.load(), CustomCurriculum::default_body());

        store.set(CUSTOM_CURRICULUM_KEY, "{ broken").unwrap();
        assert_eq!(custom.stored(), None);
        assert_eq!(custom.load(), CustomCurriculum::default_body());
    }

    #[test]
    fn test_save_load_clear() {
        let store = Arc::new(MemoryStore::new());
        let custom = CustomCurriculum::new(store.clone());
        let body = json!({ "n1": [["Cálculo I", "10101", []]] });

        custom.save(&body).unwrap();
        assert_eq!(custom.load(), body);

        custom.clear();
        assert_eq!(store.get(CUSTOM_CURRICULUM_KEY).unwrap(), None);
        assert_eq!(custom.load(), CustomCurriculum::default_body());
    }

    #[test]
    fn test_save_fails_on_unavailable_store() {
        let store = Arc::new(MemoryStore::new());
        store.set_available(false);
        let custom = CustomCurriculum::new(store);
        let err = custom.save(&json!({})).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
