//! Key/value storage backing the simulation cache.
//!
//! This module provides the `KeyValueStore` trait, modelled on the browser's
//! local storage: string keys and values, index-based enumeration in
//! insertion order, and a capacity ceiling that callers cannot read and can
//! only discover by writing.
//!
//! Backends:
//! - `MemoryStore`: bounded, insertion ordered, used for tests and embedding
//! - `FileStore`: a `MemoryStore` mirrored to a JSON file on disk

pub mod error;
pub mod file;
pub mod memory;

pub use error::StoreError;
pub use file::FileStore;
pub use memory::{MemoryStore, DEFAULT_QUOTA};

use tracing::{debug, warn};

/// Key written and removed again when probing whether a store accepts writes.
pub(crate) const PROBE_KEY: &str = "storage_probe";

/// Storage contract shared by the simulation cache, the custom curriculum
/// and last-selection memory.
///
/// Implementations must enumerate keys in insertion order; overwriting an
/// existing key keeps its position. `set` must report a full store with
/// `StoreError::QuotaExceeded` and nothing else.
pub trait KeyValueStore: Send + Sync {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Key at `index` in iteration order.
    fn key(&self, index: usize) -> Result<Option<String>, StoreError>;

    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// All keys in iteration order.
    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let len = self.len()?;
        let mut keys = Vec::with_capacity(len);
        for index in 0..len {
            if let Some(key) = self.key(index)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// All entries in iteration order.
    fn entries(&self) -> Result<Vec<(String, String)>, StoreError> {
        let mut entries = Vec::new();
        for key in self.keys()? {
            if let Some(value) = self.get(&key)? {
                entries.push((key, value));
            }
        }
        Ok(entries)
    }
}

/// Size of one entry in storage units (characters of key plus value).
pub(crate) fn entry_size(key: &str, value: &str) -> usize {
    key.chars().count() + value.chars().count()
}

/// Check whether the store accepts writes at all by writing and removing a
/// tiny probe entry. Says nothing about room for any particular payload.
pub fn probe_capacity(store: &dyn KeyValueStore) -> bool {
    match store.set(PROBE_KEY, PROBE_KEY) {
        Ok(()) => {
            if let Err(e) = store.remove(PROBE_KEY) {
                warn!(error = %e, "Failed to remove storage probe");
            }
            true
        }
        Err(e) => {
            warn!(error = %e, "Storage is unavailable or full");
            false
        }
    }
}

/// Approximate number of storage units used by every entry in the store.
/// Diagnostic only; returns 0 when the store cannot be enumerated.
pub fn used_size(store: &dyn KeyValueStore) -> usize {
    match store.entries() {
        Ok(entries) => entries.iter().map(|(k, v)| entry_size(k, v)).sum(),
        Err(e) => {
            debug!(error = %e, "Failed to enumerate store for size estimate");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_capacity_leaves_no_trace() {
        let store = MemoryStore::new();
        assert!(probe_capacity(&store));
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_probe_capacity_unavailable_store() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(!probe_capacity(&store));
    }

    #[test]
    fn test_probe_capacity_full_store() {
        let store = MemoryStore::with_quota(10);
        store.set("0123", "56789").unwrap();
        assert!(!probe_capacity(&store));
    }

    #[test]
    fn test_used_size_counts_keys_and_values() {
        let store = MemoryStore::new();
        store.set("ab", "cde").unwrap();
        store.set("ñ", "á").unwrap();
        assert_eq!(used_size(&store), 7);
    }

    #[test]
    fn test_default_keys_and_entries_follow_insertion_order() {
        let store = MemoryStore::new();
        store.set("b", "1").unwrap();
        store.set("a", "2").unwrap();
        store.set("c", "3").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["b", "a", "c"]);
        assert_eq!(
            store.entries().unwrap(),
            vec![
                ("b".to_string(), "1".to_string()),
                ("a".to_string(), "2".to_string()),
                ("c".to_string(), "3".to_string()),
            ]
        );
    }
}
