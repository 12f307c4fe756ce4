//! Searcher state: everything learned so far.
//!
//! [`SearcherState`] keeps trial evaluation records in arrival order plus
//! the bookkeeping sets that decide which records feed the next surrogate
//! refit. It is read freely but mutated only through the
//! [`StateTransformer`](crate::transformer::StateTransformer).

mod codec;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

pub use codec::decode_state;

use crate::error::{Error, Result};
use crate::space::Configuration;
use crate::space::HyperparameterRanges;

/// Internal name of the constraint metric. Values `<= 0` are feasible.
///
/// The user's constraint attribute is remapped to this name when labelling,
/// so it can never collide with a user metric.
pub const INTERNAL_CONSTRAINT_NAME: &str = "constraint_metric";

/// One trial's identity and the metric values reported for it so far.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialEvaluations {
    /// The trial identifier.
    pub trial_id: String,
    /// Metric name to value.
    pub metrics: BTreeMap<String, f64>,
}

impl TrialEvaluations {
    /// Creates a record from a metric map.
    #[must_use]
    pub fn new(trial_id: impl Into<String>, metrics: BTreeMap<String, f64>) -> Self {
        Self {
            trial_id: trial_id.into(),
            metrics,
        }
    }

    /// Creates a record holding a single metric.
    #[must_use]
    pub fn single(trial_id: impl Into<String>, name: impl Into<String>, value: f64) -> Self {
        let mut metrics = BTreeMap::new();
        metrics.insert(name.into(), value);
        Self::new(trial_id, metrics)
    }

    /// Value of `name`, if reported.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

/// The accumulated trial records and refit-control flags.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearcherState {
    records: Vec<TrialEvaluations>,
    index: HashMap<String, usize>,
    config_for_trial: BTreeMap<String, Configuration>,
    failed_trials: BTreeSet<String>,
    pending: Vec<String>,
    skip_optimization: BTreeSet<String>,
    version: u64,
}

impl SearcherState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in arrival order.
    #[must_use]
    pub fn records(&self) -> &[TrialEvaluations] {
        &self.records
    }

    /// The record for `trial_id`, if any metric was reported for it.
    #[must_use]
    pub fn get(&self, trial_id: &str) -> Option<&TrialEvaluations> {
        self.index.get(trial_id).map(|&i| &self.records[i])
    }

    /// The configuration recorded for `trial_id`.
    #[must_use]
    pub fn config(&self, trial_id: &str) -> Option<&Configuration> {
        self.config_for_trial.get(trial_id)
    }

    /// Trials whose evaluation failed.
    #[must_use]
    pub fn failed_trials(&self) -> &BTreeSet<String> {
        &self.failed_trials
    }

    /// Trials registered as running but not yet labelled.
    #[must_use]
    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    /// Trials excluded from surrogate refits.
    #[must_use]
    pub fn skip_optimization(&self) -> &BTreeSet<String> {
        &self.skip_optimization
    }

    /// Monotone counter bumped on every mutation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of labelled trials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no trial has been labelled yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records usable for fitting a model of `metric`: reported, not
    /// failed and not flagged by `skip_optimization`.
    pub fn training_records<'a>(
        &'a self,
        metric: &'a str,
    ) -> impl Iterator<Item = (&'a Configuration, f64)> + 'a {
        self.records.iter().filter_map(move |record| {
            if self.failed_trials.contains(&record.trial_id)
                || self.skip_optimization.contains(&record.trial_id)
            {
                return None;
            }
            let value = record.metric(metric)?;
            let config = self.config_for_trial.get(&record.trial_id)?;
            Some((config, value))
        })
    }

    /// Keys of every configuration already observed, running or failed.
    pub(crate) fn taken_config_keys(&self) -> HashSet<String> {
        self.config_for_trial
            .values()
            .map(crate::space::config_key)
            .collect()
    }

    /// Merge `evaluation` into the record for its trial, creating the record
    /// on first report.
    ///
    /// Validation happens before any mutation: a failed call leaves the
    /// state untouched.
    pub(crate) fn label(
        &mut self,
        evaluation: TrialEvaluations,
        config: Option<&Configuration>,
        ranges: &HyperparameterRanges,
    ) -> Result<()> {
        let trial_id = evaluation.trial_id.clone();
        if let Some((name, &value)) = evaluation.metrics.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::NonFiniteMetric {
                trial_id,
                name: name.clone(),
                value,
            });
        }
        self.ensure_config(&trial_id, config, ranges)?;

        if let Some(&i) = self.index.get(&trial_id) {
            self.records[i].metrics.extend(evaluation.metrics);
        } else {
            self.index.insert(trial_id.clone(), self.records.len());
            self.records.push(evaluation);
        }
        self.pending.retain(|id| *id != trial_id);
        self.version += 1;
        Ok(())
    }

    pub(crate) fn register_pending(
        &mut self,
        trial_id: &str,
        config: &Configuration,
        ranges: &HyperparameterRanges,
    ) -> Result<()> {
        self.ensure_config(trial_id, Some(config), ranges)?;
        let labelled = self.index.contains_key(trial_id);
        if !labelled && !self.pending.iter().any(|id| id == trial_id) {
            self.pending.push(trial_id.to_owned());
            self.version += 1;
        }
        Ok(())
    }

    pub(crate) fn mark_failed(&mut self, trial_id: &str) -> Result<()> {
        if !self.config_for_trial.contains_key(trial_id) {
            return Err(Error::UnknownTrial(trial_id.to_owned()));
        }
        self.pending.retain(|id| id != trial_id);
        self.failed_trials.insert(trial_id.to_owned());
        self.version += 1;
        Ok(())
    }

    pub(crate) fn mark_skip(&mut self, trial_id: &str) -> Result<()> {
        if !self.config_for_trial.contains_key(trial_id) {
            return Err(Error::UnknownTrial(trial_id.to_owned()));
        }
        if self.skip_optimization.insert(trial_id.to_owned()) {
            self.version += 1;
        }
        Ok(())
    }

    pub(crate) fn set_skip_optimization(&mut self, skip: BTreeSet<String>) {
        self.skip_optimization = skip;
        self.version += 1;
    }

    /// Store the configuration for `trial_id`, or check it against the
    /// stored one.
    fn ensure_config(
        &mut self,
        trial_id: &str,
        config: Option<&Configuration>,
        ranges: &HyperparameterRanges,
    ) -> Result<()> {
        match (self.config_for_trial.get(trial_id), config) {
            (Some(stored), Some(given)) => {
                if *stored != ranges.validate(given)? {
                    return Err(Error::InconsistentConfig(trial_id.to_owned()));
                }
            }
            (Some(_), None) => {}
            (None, Some(given)) => {
                let normalized = ranges.validate(given)?;
                self.config_for_trial.insert(trial_id.to_owned(), normalized);
            }
            (None, None) => return Err(Error::UnknownTrial(trial_id.to_owned())),
        }
        Ok(())
    }
}
