//! In-memory storage backend.
//!
//! Entries are kept in insertion order and their total size is bounded by a
//! quota, so a full store rejects writes the same way browser storage does.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{entry_size, KeyValueStore, StoreError};

/// Default quota, in storage units. Matches the usual browser allowance.
pub const DEFAULT_QUOTA: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
struct MemoryState {
    entries: Vec<(String, String)>,
    used: usize,
    quota: usize,
    available: bool,
}

impl MemoryState {
    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }
}

#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA)
    }

    pub fn with_quota(quota: usize) -> Self {
        Self::from_entries(Vec::new(), quota)
    }

    /// Build a store from existing entries, keeping their order. The quota
    /// only applies to later writes.
    pub fn from_entries(entries: Vec<(String, String)>, quota: usize) -> Self {
        let used = entries.iter().map(|(k, v)| entry_size(k, v)).sum();
        Self {
            state: RwLock::new(MemoryState {
                entries,
                used,
                quota,
                available: true,
            }),
        }
    }

    /// Toggle whether the store accepts writes. An unavailable store still
    /// serves reads and removals.
    pub fn set_available(&self, available: bool) {
        self.write().available = available;
    }

    pub fn quota(&self) -> usize {
        self.read().quota
    }

    pub fn used(&self) -> usize {
        self.read().used
    }

    // A poisoned lock only means another thread panicked mid-call; every
    // mutation below leaves the state consistent before it can panic.
    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut state = self.write();
        if !state.available {
            return Err(StoreError::Unavailable(
                "store is not accepting writes".to_string(),
            ));
        }

        let existing = state.position(key);
        let replaced = existing
            .map(|i| entry_size(&state.entries[i].0, &state.entries[i].1))
            .unwrap_or(0);
        let needed = entry_size(key, value);
        let base = state.used - replaced;

        if base + needed > state.quota {
            return Err(StoreError::QuotaExceeded {
                key: key.to_string(),
                needed,
                available: state.quota.saturating_sub(base),
            });
        }

        match existing {
            Some(i) => state.entries[i].1 = value.to_string(),
            None => state.entries.push((key.to_string(), value.to_string())),
        }
        state.used = base + needed;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let state = self.read();
        Ok(state.position(key).map(|i| state.entries[i].1.clone()))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut state = self.write();
        if let Some(i) = state.position(key) {
            let (k, v) = state.entries.remove(i);
            state.used -= entry_size(&k, &v);
        }
        Ok(())
    }

    fn key(&self, index: usize) -> Result<Option<String>, StoreError> {
        Ok(self.read().entries.get(index).map(|(k, _)| k.clone()))
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read().entries.len())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read().entries.iter().map(|(k, _)| k.clone()).collect())
    }

    fn entries(&self) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self.read().entries.clone())
    }
}
