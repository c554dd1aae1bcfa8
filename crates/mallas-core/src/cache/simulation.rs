use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::custom::CustomCurriculum;
use crate::models::{CurriculumId, SimulationState, SimulationUpdate};
use crate::storage::{probe_capacity, used_size, KeyValueStore, StoreError};

/// Namespace prefix of persisted simulation states.
pub const SIMULATION_KEY_PREFIX: &str = "malla_simulation_";

/// What happened when a simulation state was mirrored to the store.
/// The in-memory state is updated in every case.
#[derive(Debug)]
pub enum PersistOutcome {
    Persisted,
    /// The store was full; older states were evicted and the retry worked.
    PersistedAfterEviction { evicted: Vec<String> },
    /// Empty id, nothing was done.
    Skipped,
    /// The store refused even a probe write.
    StoreUnavailable,
    /// The write failed for a reason other than a full store.
    Failed(StoreError),
    /// The store was full and still was after evicting.
    RetryFailed {
        evicted: Vec<String>,
        error: StoreError,
    },
}

impl PersistOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(
            self,
            PersistOutcome::Persisted | PersistOutcome::PersistedAfterEviction { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PersistedEntry {
    pub key: String,
    pub value: Value,
}

/// Read-only dump of both cache tiers.
#[derive(Debug, Clone, Serialize)]
pub struct DebugSnapshot {
    pub in_memory: BTreeMap<String, SimulationState>,
    pub persisted: Vec<PersistedEntry>,
    pub custom_curriculum: Option<Value>,
    pub used_size: usize,
}

/// Per-curriculum simulation state with memory-speed reads and a
/// best-effort persistent mirror.
///
/// Memory is authoritative. The store is written behind every update and
/// only read when `hydrate_from_store` is called; it may lag, refuse writes,
/// or lose entries to eviction without affecting what `get_state` returns.
/// Create one per application and pass it by reference; dropping it
/// disposes the memory tier and leaves the store as is.
pub struct SimulationCache {
    memory: HashMap<String, SimulationState>,
    store: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl SimulationCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_prefix(store, SIMULATION_KEY_PREFIX)
    }

    pub fn with_prefix(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            memory: HashMap::new(),
            store,
            prefix: prefix.into(),
        }
    }

    pub fn storage_key(&self, id: &CurriculumId) -> String {
        format!("{}{}", self.prefix, id)
    }

    /// Current state for `id`, installing the default on first access.
    /// Never touches the store.
    pub fn get_state(&mut self, id: &str) -> SimulationState {
        let Ok(id) = CurriculumId::parse(id) else {
            return SimulationState::default();
        };
        self.memory
            .entry(id.as_str().to_string())
            .or_default()
            .clone()
    }

    /// Load the persisted state for `id` into memory, replacing what was
    /// there. Falls back to the default, in memory only, when nothing
    /// usable is stored.
    pub fn hydrate_from_store(&mut self, id: &str) -> SimulationState {
        let Ok(id) = CurriculumId::parse(id) else {
            return SimulationState::default();
        };
        let key = self.storage_key(&id);

        let state = match self.store.get(&key) {
            Ok(Some(raw)) => match serde_json::from_str::<SimulationState>(&raw) {
                Ok(state) => {
                    debug!(curriculum = %id, approved = state.approved_courses.len(), "Hydrated simulation state");
                    state
                }
                Err(e) => {
                    warn!(curriculum = %id, error = %e, "Discarding undecodable simulation state");
                    SimulationState::default()
                }
            },
            Ok(None) => {
                debug!(curriculum = %id, "No persisted simulation state, using default");
                SimulationState::default()
            }
            Err(e) => {
                warn!(curriculum = %id, error = %e, "Failed to read persisted simulation state");
                SimulationState::default()
            }
        };

        self.memory.insert(id.as_str().to_string(), state.clone());
        state
    }

    /// Merge `update` over the current state, keep the result in memory and
    /// try to persist it. An empty id is ignored.
    pub fn update_state(&mut self, id: &str, update: SimulationUpdate) -> PersistOutcome {
        let Ok(id) = CurriculumId::parse(id) else {
            return PersistOutcome::Skipped;
        };

        let current = self.get_state(id.as_str());
        let updated = current.merged(&update);
        debug!(
            curriculum = %id,
            before = ?current,
            update = ?update,
            after = ?updated,
            "Updating simulation state"
        );
        self.memory.insert(id.as_str().to_string(), updated.clone());

        self.persist(&id, &updated)
    }

    /// Forget `id`, or every simulation state in this namespace when `id` is
    /// `None`. Entries of other namespaces are left alone. Returns how many
    /// persisted entries were removed.
    pub fn clear_state(&mut self, id: Option<&str>) -> usize {
        match id {
            Some(raw) => {
                let Ok(id) = CurriculumId::parse(raw) else {
                    return 0;
                };
                self.memory.remove(id.as_str());
                let key = self.storage_key(&id);
                let existed = matches!(self.store.get(&key), Ok(Some(_)));
                match self.store.remove(&key) {
                    Ok(()) => {
                        debug!(curriculum = %id, "Cleared simulation state");
                        usize::from(existed)
                    }
                    Err(e) => {
                        warn!(curriculum = %id, error = %e, "Failed to remove persisted simulation state");
                        0
                    }
                }
            }
            None => {
                self.memory.clear();
                let mut removed = 0;
                for key in self.namespaced_keys() {
                    match self.store.remove(&key) {
                        Ok(()) => removed += 1,
                        Err(e) => warn!(key = %key, error = %e, "Failed to remove persisted simulation state"),
                    }
                }
                info!(removed, "Cleared all simulation states");
                removed
            }
        }
    }

    /// Whether the store accepts writes at all right now.
    pub fn has_capacity(&self) -> bool {
        probe_capacity(self.store.as_ref())
    }

    /// Approximate storage units used by the whole store.
    pub fn estimate_used_size(&self) -> usize {
        used_size(self.store.as_ref())
    }

    pub fn debug_snapshot(&self) -> DebugSnapshot {
        let persisted = self
            .namespaced_keys()
            .into_iter()
            .filter_map(|key| match self.store.get(&key) {
                Ok(Some(raw)) => {
                    let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
                    Some(PersistedEntry { key, value })
                }
                _ => None,
            })
            .collect();

        DebugSnapshot {
            in_memory: self
                .memory
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            persisted,
            custom_curriculum: CustomCurriculum::new(self.store.clone()).stored(),
            used_size: self.estimate_used_size(),
        }
    }

    /// Keys under this cache's prefix, in store order.
    fn namespaced_keys(&self) -> Vec<String> {
        match self.store.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(&self.prefix))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to enumerate store keys");
                Vec::new()
            }
        }
    }

    fn persist(&self, id: &CurriculumId, state: &SimulationState) -> PersistOutcome {
        if !self.has_capacity() {
            warn!(curriculum = %id, "Storage unavailable, simulation state kept in memory only");
            return PersistOutcome::StoreUnavailable;
        }
        debug!(used = self.estimate_used_size(), "Current storage usage");

        let key = self.storage_key(id);
        let encoded = match serde_json::to_string(state) {
            Ok(encoded) => encoded,
            Err(e) => return PersistOutcome::Failed(e.into()),
        };

        match self.store.set(&key, &encoded) {
            Ok(()) => {
                debug!(curriculum = %id, "Persisted simulation state");
                PersistOutcome::Persisted
            }
            Err(e) if e.is_quota_exceeded() => {
                warn!(curriculum = %id, error = %e, "Storage full, evicting older simulation states");
                let evicted = self.evict_oldest_half(&key);
                match self.store.set(&key, &encoded) {
                    Ok(()) => {
                        info!(curriculum = %id, evicted = evicted.len(), "Persisted simulation state after eviction");
                        PersistOutcome::PersistedAfterEviction { evicted }
                    }
                    Err(error) => {
                        error!(curriculum = %id, error = %error, "Could not persist simulation state even after eviction");
                        PersistOutcome::RetryFailed { evicted, error }
                    }
                }
            }
            Err(e) => {
                warn!(curriculum = %id, error = %e, "Failed to persist simulation state");
                PersistOutcome::Failed(e)
            }
        }
    }

    /// Remove the older half (rounded up) of this namespace's entries other
    /// than `keep`, oldest first by store order.
    fn evict_oldest_half(&self, keep: &str) -> Vec<String> {
        let candidates: Vec<String> = self
            .namespaced_keys()
            .into_iter()
            .filter(|k| k != keep)
            .collect();
        let count = candidates.len().div_ceil(2);

        let mut evicted = Vec::with_capacity(count);
        for key in candidates.into_iter().take(count) {
            match self.store.remove(&key) {
                Ok(()) => evicted.push(key),
                Err(e) => warn!(key = %key, error = %e, "Failed to evict simulation state"),
            }
        }
        evicted
    }
}
