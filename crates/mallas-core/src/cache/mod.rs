//! Caching for catalog snapshots and simulation state.
//!
//! This module provides:
//! - `CachedData`: a value tagged with when it was produced, used for
//!   catalog snapshots
//! - `SimulationCache`: the two-tier (memory + key/value store) cache of
//!   per-curriculum simulation state, with quota-aware eviction

pub mod cached;
pub mod simulation;

pub use cached::CachedData;
pub use simulation::{
    DebugSnapshot, PersistOutcome, PersistedEntry, SimulationCache, SIMULATION_KEY_PREFIX,
};
