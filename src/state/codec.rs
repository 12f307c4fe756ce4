use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{SearcherState, TrialEvaluations};
use crate::error::{Error, Result};
use crate::space::{Configuration, HyperparameterRanges};

/// Wire form of the trial history. Skip-optimization flags travel next to
/// it in the snapshot, not inside it.
#[derive(Serialize, Deserialize)]
struct EncodedState {
    config_for_trial: BTreeMap<String, Configuration>,
    trials_evaluations: Vec<TrialEvaluations>,
    #[serde(default)]
    failed_trials: Vec<String>,
    #[serde(default)]
    pending_evaluations: Vec<String>,
}

impl SearcherState {
    /// Encodes the trial history (records, configurations, failed and
    /// pending trials) as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if serialization fails, which cannot
    /// happen for states built through the transformer.
    pub fn encode(&self) -> Result<Value> {
        let encoded = EncodedState {
            config_for_trial: self.config_for_trial.clone(),
            trials_evaluations: self.records.clone(),
            failed_trials: self.failed_trials.iter().cloned().collect(),
            pending_evaluations: self.pending.clone(),
        };
        Ok(serde_json::to_value(encoded)?)
    }
}

/// Rebuilds a [`SearcherState`] from [`SearcherState::encode`] output.
///
/// Every stored configuration is validated against `ranges`, every record
/// must have a configuration and trial ids must be unique. The returned
/// state has no skip-optimization flags.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the value is malformed or inconsistent,
/// or a validation error if a configuration does not fit `ranges`.
pub fn decode_state(encoded: &Value, ranges: &HyperparameterRanges) -> Result<SearcherState> {
    let encoded = EncodedState::deserialize(encoded)?;

    let mut config_for_trial = BTreeMap::new();
    for (trial_id, config) in encoded.config_for_trial {
        let normalized = ranges.validate(&config)?;
        config_for_trial.insert(trial_id, normalized);
    }

    let mut index = HashMap::with_capacity(encoded.trials_evaluations.len());
    for (i, record) in encoded.trials_evaluations.iter().enumerate() {
        if !config_for_trial.contains_key(&record.trial_id) {
            return Err(Error::Decode(format!(
                "trial '{}' has no configuration",
                record.trial_id
            )));
        }
        if record.metrics.values().any(|v| !v.is_finite()) {
            return Err(Error::Decode(format!(
                "trial '{}' has a non-finite metric",
                record.trial_id
            )));
        }
        if index.insert(record.trial_id.clone(), i).is_some() {
            return Err(Error::Decode(format!(
                "duplicate trial '{}'",
                record.trial_id
            )));
        }
    }

    for trial_id in encoded
        .failed_trials
        .iter()
        .chain(&encoded.pending_evaluations)
    {
        if !config_for_trial.contains_key(trial_id) {
            return Err(Error::Decode(format!(
                "trial '{trial_id}' has no configuration"
            )));
        }
    }

    Ok(SearcherState {
        records: encoded.trials_evaluations,
        index,
        config_for_trial,
        failed_trials: encoded.failed_trials.into_iter().collect(),
        pending: encoded.pending_evaluations,
        skip_optimization: std::collections::BTreeSet::new(),
        version: 0,
    })
}
