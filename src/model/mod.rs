//! Surrogate estimator interface and the output-model capability.
//!
//! An [`Estimator`] turns [`TrainingData`] into a [`Predictor`]. Estimators
//! keep whatever they learned across fits (e.g. GP hyperparameters), which
//! is what a cloned searcher inherits instead of starting from scratch.
//!
//! [`OutputModels`] is chosen at construction: one estimator for the
//! objective, or an objective estimator plus an independent constraint
//! estimator.

pub mod gp;

use crate::error::{Error, Result};
use crate::space::HyperparameterRanges;
use crate::state::SearcherState;

pub use gp::{GpEstimator, GpHyperparameters};

/// Predictive distribution at one point, in the units of the training
/// targets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    /// Posterior mean.
    pub mean: f64,
    /// Posterior standard deviation.
    pub std: f64,
}

/// A fitted surrogate model.
pub trait Predictor: Send + Sync {
    /// Predicts at an encoded point of `[0, 1]^d`.
    fn predict(&self, x: &[f64]) -> Prediction;

    /// Number of training points the model was fitted on.
    fn num_data(&self) -> usize;
}

/// Something that can be fitted to training data.
///
/// `update_params` tells the estimator whether to re-learn its
/// hyperparameters or to reuse the ones from the previous fit and only
/// recompute the posterior.
pub trait Estimator: Send + Sync {
    /// Fits a predictor.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is empty or the model cannot be fitted.
    fn fit(&mut self, data: &TrainingData, update_params: bool) -> Result<Box<dyn Predictor>>;

    /// Clones the estimator, including anything it has learned.
    fn boxed_clone(&self) -> Box<dyn Estimator>;
}

impl Clone for Box<dyn Estimator> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Encoded inputs and scalar targets for one output.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingData {
    /// Encoded configurations, one row per trial.
    pub x: Vec<Vec<f64>>,
    /// Targets, aligned with `x`.
    pub y: Vec<f64>,
}

impl TrainingData {
    /// Collects the records of `state` that carry `metric`, encoding their
    /// configurations with `ranges` and mapping targets through `transform`.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored configuration no longer validates.
    pub fn from_state(
        state: &SearcherState,
        ranges: &HyperparameterRanges,
        metric: &str,
        transform: impl Fn(f64) -> f64,
    ) -> Result<Self> {
        let mut data = Self::default();
        for (config, value) in state.training_records(metric) {
            data.x.push(ranges.to_ndarray(config)?);
            data.y.push(transform(value));
        }
        Ok(data)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// Returns `true` if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Number of features per row, if any row exists.
    #[must_use]
    pub fn dims(&self) -> Option<usize> {
        self.x.first().map(Vec::len)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::ModelFit("no training data"));
        }
        let dims = self.x[0].len();
        if let Some(row) = self.x.iter().find(|row| row.len() != dims) {
            return Err(Error::DimensionMismatch {
                expected: dims,
                got: row.len(),
            });
        }
        if self.x.len() != self.y.len() {
            return Err(Error::DimensionMismatch {
                expected: self.x.len(),
                got: self.y.len(),
            });
        }
        Ok(())
    }
}

/// The surrogate models a searcher maintains.
#[derive(Clone)]
pub enum OutputModels {
    /// One model for the objective.
    Single {
        /// Objective estimator.
        objective: Box<dyn Estimator>,
    },
    /// Independent objective and constraint models.
    Constrained {
        /// Objective estimator.
        objective: Box<dyn Estimator>,
        /// Constraint estimator.
        constraint: Box<dyn Estimator>,
    },
}

impl OutputModels {
    /// Mutable access to the objective estimator.
    pub fn objective_mut(&mut self) -> &mut dyn Estimator {
        match self {
            OutputModels::Single { objective } | OutputModels::Constrained { objective, .. } => {
                objective.as_mut()
            }
        }
    }

    /// Mutable access to the constraint estimator, if this is a constrained
    /// model set.
    pub fn constraint_mut(&mut self) -> Option<&mut dyn Estimator> {
        match self {
            OutputModels::Single { .. } => None,
            OutputModels::Constrained { constraint, .. } => Some(constraint.as_mut()),
        }
    }

    /// Whether a constraint model is maintained.
    #[must_use]
    pub fn is_constrained(&self) -> bool {
        matches!(self, OutputModels::Constrained { .. })
    }
}

impl core::fmt::Debug for OutputModels {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OutputModels::Single { .. } => f.write_str("OutputModels::Single"),
            OutputModels::Constrained { .. } => f.write_str("OutputModels::Constrained"),
        }
    }
}
