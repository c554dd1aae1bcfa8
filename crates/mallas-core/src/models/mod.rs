//! Data models for curricula and simulation state.
//!
//! - `CurriculumId`: published curriculum or the custom one
//! - `CatalogEntry`, `CurriculumInfo`: catalog summaries
//! - `CurriculumDocument`, `CatalogIndex`: raw published payloads
//! - `SimulationState`, `SimulationUpdate`: simulated approvals

pub mod curriculum;
pub mod simulation;

pub use curriculum::{
    CatalogEntry, CatalogIndex, CurriculumDocument, CurriculumId, CurriculumInfo,
    InvalidCurriculumId, CUSTOM_CURRICULUM_ID, UNKNOWN_DEPARTMENT,
};
pub use simulation::{SimulationState, SimulationUpdate};
