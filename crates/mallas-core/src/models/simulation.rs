//! Simulated progress through one curriculum.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Courses the user pretends to have passed, plus whether simulation mode
/// is on. Missing fields decode to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SimulationState {
    #[serde(alias = "approvedMaterias")]
    pub approved_courses: BTreeSet<String>,
    pub is_simulating: bool,
}

impl SimulationState {
    pub fn is_approved(&self, course: &str) -> bool {
        self.approved_courses.contains(course)
    }

    /// Apply `update` field by field; fields it leaves unset are kept.
    pub fn merged(&self, update: &SimulationUpdate) -> Self {
        Self {
            approved_courses: update
                .approved_courses
                .clone()
                .unwrap_or_else(|| self.approved_courses.clone()),
            is_simulating: update.is_simulating.unwrap_or(self.is_simulating),
        }
    }
}

/// A partial `SimulationState`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationUpdate {
    pub approved_courses: Option<BTreeSet<String>>,
    pub is_simulating: Option<bool>,
}

impl SimulationUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn approved_courses<I, S>(mut self, courses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.approved_courses = Some(courses.into_iter().map(Into::into).collect());
        self
    }

    pub fn simulating(mut self, is_simulating: bool) -> Self {
        self.is_simulating = Some(is_simulating);
        self
    }
}
