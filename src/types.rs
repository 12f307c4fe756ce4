//! Core types shared by the searcher components.

use serde::{Deserialize, Serialize};

/// Whether the objective metric should be minimized or maximized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Smaller objective values are better.
    #[default]
    Min,
    /// Larger objective values are better.
    Max,
}

impl Mode {
    /// Map a reported objective value onto the internal minimization scale.
    #[must_use]
    pub fn to_internal(self, value: f64) -> f64 {
        match self {
            Mode::Min => value,
            Mode::Max => -value,
        }
    }

    /// Map an internal value back to the user's scale.
    #[must_use]
    pub fn from_internal(self, value: f64) -> f64 {
        self.to_internal(value)
    }
}

/// Which surrogate models a searcher maintains.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearcherKind {
    /// A single model for the objective metric.
    #[default]
    Standard,
    /// An objective model plus an independent model for the constraint
    /// metric. Requires the `constraint_attr` search option.
    Constrained,
}

/// Lifecycle of a searcher instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Accepting `suggest`/`update` calls.
    Active,
    /// State was handed to a clone; every call fails.
    Retired,
}
