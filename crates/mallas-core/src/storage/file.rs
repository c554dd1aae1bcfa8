//! File-backed storage.
//!
//! Entries live in a `MemoryStore` and every change is flushed to a single
//! JSON file, keeping insertion order across restarts. A failed flush rolls
//! the in-memory change back so the file and memory never disagree.
//!
//! Rewriting an unchanged value does not touch the file, and neither does
//! the capacity probe: the probe key only ever lives in memory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{KeyValueStore, MemoryStore, StoreError, DEFAULT_QUOTA, PROBE_KEY};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    entries: Vec<StoredEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    value: String,
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    memory: MemoryStore,
}

impl FileStore {
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        Self::open_with_quota(path, DEFAULT_QUOTA)
    }

    /// Open the store at `path`, loading existing entries if the file exists.
    pub fn open_with_quota(path: PathBuf, quota: usize) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let file: StoreFile = serde_json::from_str(&contents)?;
            file.entries
                .into_iter()
                .map(|e| (e.key, e.value))
                .collect()
        } else {
            Vec::new()
        };

        debug!(path = %path.display(), entries = entries.len(), "Opened file store");

        Ok(Self {
            path,
            memory: MemoryStore::from_entries(entries, quota),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let file = StoreFile {
            entries: self
                .memory
                .entries()?
                .into_iter()
                .filter(|(key, _)| key != PROBE_KEY)
                .map(|(key, value)| StoredEntry { key, value })
                .collect(),
        };
        let contents = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    /// Put `key` back to `previous` after a failed flush.
    fn restore(&self, key: &str, previous: Option<String>) {
        let _ = match previous {
            Some(value) => self.memory.set(key, &value),
            None => self.memory.remove(key),
        };
    }
}

impl KeyValueStore for FileStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let previous = self.memory.get(key)?;
        self.memory.set(key, value)?;
        if key == PROBE_KEY || previous.as_deref() == Some(value) {
            return Ok(());
        }
        if let Err(e) = self.flush() {
            self.restore(key, previous);
            return Err(e);
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.memory.get(key)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let Some(previous) = self.memory.get(key)? else {
            return Ok(());
        };
        self.memory.remove(key)?;
        if key == PROBE_KEY {
            return Ok(());
        }
        if let Err(e) = self.flush() {
            self.restore(key, Some(previous));
            return Err(e);
        }
        Ok(())
    }

    fn key(&self, index: usize) -> Result<Option<String>, StoreError> {
        self.memory.key(index)
    }

    fn len(&self) -> Result<usize, StoreError> {
        self.memory.len()
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.memory.keys()
    }

    fn entries(&self) -> Result<Vec<(String, String)>, StoreError> {
        self.memory.entries()
    }
}
