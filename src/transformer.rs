//! The single mutation point for [`SearcherState`].
//!
//! [`StateTransformer`] applies labels, failure marks and skip flags to the
//! state, owns the estimators, and refits them lazily: the fitted models
//! are cached together with the state version they were fitted on and are
//! rebuilt only when a suggestion needs them and the version has moved.

use std::sync::Arc;

use crate::acquisition::AcquisitionContext;
use crate::error::Result;
use crate::model::{OutputModels, Predictor, TrainingData};
use crate::space::{Configuration, HyperparameterRanges};
use crate::state::{INTERNAL_CONSTRAINT_NAME, SearcherState, TrialEvaluations};
use crate::types::Mode;

/// Models fitted on one version of the state.
pub struct FittedModels {
    /// State version the models were fitted on.
    pub version: u64,
    /// Objective model, if there was data to fit it.
    pub objective: Option<Arc<dyn Predictor>>,
    /// Constraint model, for constrained searchers with constraint data.
    pub constraint: Option<Arc<dyn Predictor>>,
    /// Best internal objective among (feasible) observations.
    pub incumbent: Option<f64>,
    /// Encoded configuration of the incumbent.
    pub incumbent_x: Option<Vec<f64>>,
    constrained: bool,
}

impl FittedModels {
    /// Borrows the models as an acquisition context.
    #[must_use]
    pub fn context(&self) -> AcquisitionContext<'_> {
        AcquisitionContext {
            objective: self.objective.as_deref(),
            constraint: self.constraint.as_deref(),
            incumbent: self.incumbent,
            incumbent_x: self.incumbent_x.as_deref(),
            constrained: self.constrained,
        }
    }
}

/// Owns the searcher state and the surrogate models fitted on it.
pub struct StateTransformer {
    state: SearcherState,
    ranges: HyperparameterRanges,
    models: OutputModels,
    metric: String,
    mode: Mode,
    opt_skip_period: usize,
    /// Number of objective observations when hyperparameters were last
    /// re-estimated.
    last_hp_fit: Option<usize>,
    fitted: Option<FittedModels>,
    debug_log: bool,
}

impl StateTransformer {
    /// Creates a transformer over `state`.
    ///
    /// `models` may already carry learned hyperparameters (when cloning);
    /// they are reused as the starting point for the first fit.
    #[must_use]
    pub fn new(
        state: SearcherState,
        ranges: HyperparameterRanges,
        models: OutputModels,
        metric: impl Into<String>,
        mode: Mode,
        opt_skip_period: usize,
    ) -> Self {
        Self {
            state,
            ranges,
            models,
            metric: metric.into(),
            mode,
            opt_skip_period: opt_skip_period.max(1),
            last_hp_fit: None,
            fitted: None,
            debug_log: false,
        }
    }

    pub(crate) fn set_debug_log(&mut self, debug_log: bool) {
        self.debug_log = debug_log;
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> &SearcherState {
        &self.state
    }

    /// The encoding ranges.
    #[must_use]
    pub fn ranges(&self) -> &HyperparameterRanges {
        &self.ranges
    }

    /// The estimators with everything they have learned so far.
    #[must_use]
    pub fn estimators(&self) -> &OutputModels {
        &self.models
    }

    /// Observation count at the last hyperparameter fit.
    #[must_use]
    pub fn last_hp_fit(&self) -> Option<usize> {
        self.last_hp_fit
    }

    pub(crate) fn set_last_hp_fit(&mut self, value: Option<usize>) {
        self.last_hp_fit = value;
    }

    /// Whether the cached models are stale.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.fitted
            .as_ref()
            .is_none_or(|f| f.version != self.state.version())
    }

    /// Merges `evaluation` into the trial's record, creating it on first
    /// report. `config` is required the first time a trial is seen and
    /// must match the stored configuration afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown trials, inconsistent or invalid
    /// configurations and non-finite metrics. The state is unchanged on
    /// error.
    pub fn label_trial(
        &mut self,
        evaluation: TrialEvaluations,
        config: Option<&Configuration>,
    ) -> Result<()> {
        if self.debug_log {
            trace_debug!(trial_id = %evaluation.trial_id, metrics = ?evaluation.metrics, "label trial");
        }
        self.state.label(evaluation, config, &self.ranges)
    }

    /// Registers a running trial so its configuration is not suggested again.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or conflicts with
    /// the stored one.
    pub fn register_pending(&mut self, trial_id: &str, config: &Configuration) -> Result<()> {
        self.state.register_pending(trial_id, config, &self.ranges)
    }

    /// Marks a trial as failed; it is excluded from fitting from now on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTrial`](crate::Error::UnknownTrial) if the
    /// trial has no recorded configuration.
    pub fn mark_failed(&mut self, trial_id: &str) -> Result<()> {
        self.state.mark_failed(trial_id)
    }

    /// Excludes a trial's data from subsequent refits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTrial`](crate::Error::UnknownTrial) if the
    /// trial has no recorded configuration.
    pub fn mark_skip_optimization(&mut self, trial_id: &str) -> Result<()> {
        self.state.mark_skip(trial_id)
    }

    /// Number of records usable for the objective model.
    #[must_use]
    pub fn num_objective_observations(&self) -> usize {
        self.state.training_records(&self.metric).count()
    }

    /// Returns models fitted on the current state, refitting if the state
    /// changed since the last fit.
    ///
    /// A model whose fit fails is left out; callers then fall back to
    /// random suggestions.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored configuration cannot be encoded.
    pub fn fitted_models(&mut self) -> Result<&FittedModels> {
        if self.is_dirty() {
            let fitted = self.refit()?;
            return Ok(self.fitted.insert(fitted));
        }
        self.fitted
            .as_ref()
            .ok_or(crate::Error::ModelFit("fitted models missing"))
    }

    fn refit(&mut self) -> Result<FittedModels> {
        let mode = self.mode;
        let objective_data = TrainingData::from_state(&self.state, &self.ranges, &self.metric, |v| {
            mode.to_internal(v)
        })?;
        let n = objective_data.len();
        let update_params = self
            .last_hp_fit
            .is_none_or(|last| n.saturating_sub(last) >= self.opt_skip_period);
        if self.debug_log {
            trace_info!(
                version = self.state.version(),
                num_observations = n,
                update_params,
                "refitting surrogate models"
            );
        }

        let objective = fit_output(self.models.objective_mut(), &objective_data, update_params);
        if objective.is_some() && update_params {
            self.last_hp_fit = Some(n);
        }

        let constrained = self.models.is_constrained();
        let constraint = if let Some(estimator) = self.models.constraint_mut() {
            let data =
                TrainingData::from_state(&self.state, &self.ranges, INTERNAL_CONSTRAINT_NAME, |v| v)?;
            fit_output(estimator, &data, update_params)
        } else {
            None
        };

        let (incumbent, incumbent_x) = self.incumbent(constrained)?;
        Ok(FittedModels {
            version: self.state.version(),
            objective,
            constraint,
            incumbent,
            incumbent_x,
            constrained,
        })
    }

    /// Best internal objective, restricted to feasible records when
    /// constrained. Records without a constraint value are not feasible.
    fn incumbent(&self, constrained: bool) -> Result<(Option<f64>, Option<Vec<f64>>)> {
        let mut best: Option<(f64, &Configuration)> = None;
        for record in self.state.records() {
            if self.state.failed_trials().contains(&record.trial_id)
                || self.state.skip_optimization().contains(&record.trial_id)
            {
                continue;
            }
            let Some(value) = record.metric(&self.metric) else {
                continue;
            };
            if constrained
                && record
                    .metric(INTERNAL_CONSTRAINT_NAME)
                    .is_none_or(|c| c > 0.0)
            {
                continue;
            }
            let internal = self.mode.to_internal(value);
            if best.is_some_and(|(b, _)| b <= internal) {
                continue;
            }
            if let Some(config) = self.state.config(&record.trial_id) {
                best = Some((internal, config));
            }
        }
        match best {
            Some((value, config)) => Ok((Some(value), Some(self.ranges.to_ndarray(config)?))),
            None => Ok((None, None)),
        }
    }
}

fn fit_output(
    estimator: &mut dyn crate::model::Estimator,
    data: &TrainingData,
    update_params: bool,
) -> Option<Arc<dyn Predictor>> {
    if data.is_empty() {
        return None;
    }
    estimator
        .fit(data, update_params)
        .map_err(|err| {
            trace_debug!(error = %err, "surrogate fit failed");
            err
        })
        .ok()
        .map(Arc::from)
}
