//! Curriculum catalog and simulation-state cache.
//!
//! `mallas-core` discovers published degree curricula ("mallas"), fetches
//! their bodies on demand, and keeps per-curriculum simulated approvals in
//! memory, mirrored best-effort into a size-bounded key/value store.
//!
//! - `catalog`: `CatalogLoader`, single-flight discovery and body fetching
//! - `cache`: `SimulationCache`, the two-tier simulation state cache
//! - `storage`: the `KeyValueStore` contract and its backends
//! - `api`: `DocumentSource` over HTTP or a local directory
//! - `custom`, `selection`: other small records kept in the same store

pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod custom;
pub mod models;
pub mod selection;
pub mod storage;
pub mod utils;

pub use api::{DirectorySource, DocumentSource, FetchError, HttpSource};
pub use cache::{DebugSnapshot, PersistOutcome, SimulationCache};
pub use catalog::{Catalog, CatalogIssue, CatalogLoader, CatalogSnapshot};
pub use config::{Config, SourceLocation};
pub use custom::CustomCurriculum;
pub use models::{CatalogEntry, CurriculumId, CurriculumInfo, SimulationState, SimulationUpdate};
pub use selection::LastSelection;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StoreError};
