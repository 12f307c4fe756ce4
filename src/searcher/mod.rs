//! The searcher façade: suggest configurations, ingest results, hand state
//! to a clone.
//!
//! A [`GpSearcher`] is safe to share between worker threads. All mutable
//! data sits behind one lock, and every public operation first checks
//! that the searcher has not been retired by
//! [`clone_from_state`](GpSearcher::clone_from_state).

mod builder;
mod snapshot;

use std::collections::{BTreeMap, VecDeque};

use parking_lot::Mutex;

pub use builder::{
    DEFAULT_MIN_FEASIBILITY, DEFAULT_NUM_INIT_CANDIDATES, DEFAULT_NUM_INIT_RANDOM,
    GpSearcherBuilder, SearchOptions,
};
pub use snapshot::{SNAPSHOT_VERSION, SearcherSnapshot};

use crate::acquisition::CandidateOptimizer;
use crate::error::{Error, Result};
use crate::model::{Estimator, OutputModels};
use crate::space::{Configuration, HyperparameterRanges, SearchSpace, config_key};
use crate::state::{INTERNAL_CONSTRAINT_NAME, SearcherState, TrialEvaluations, decode_state};
use crate::transformer::StateTransformer;
use crate::types::{LifecycleState, SearcherKind};

/// Metric values reported for a trial, by name.
pub type Report = BTreeMap<String, f64>;

/// Random draws attempted before the space is considered exhausted.
const MAX_RANDOM_RETRIES: usize = 100;

/// Construction arguments, kept so that a clone can be built the same way.
#[derive(Clone, Debug)]
pub(crate) struct SearcherArgs {
    pub(crate) space: SearchSpace,
    pub(crate) metric: String,
    pub(crate) kind: SearcherKind,
    pub(crate) points_to_evaluate: Vec<Configuration>,
    pub(crate) options: SearchOptions,
}

/// Gaussian-process searcher, optionally constraint-aware.
///
/// The standard variant models the objective only. The constrained variant
/// also models the constraint attribute (feasible when `<= 0`) and ranks
/// candidates by constrained expected improvement.
///
/// # Examples
///
/// ```
/// use gp_searcher::space::{Configuration, SearchSpace};
/// use gp_searcher::{GpSearcher, Report};
///
/// let space = SearchSpace::new().float("x", -2.0, 2.0);
/// let searcher = GpSearcher::builder(space, "loss")
///     .constrained("excess")
///     .random_seed(3)
///     .build()
///     .unwrap();
///
/// for i in 0..6 {
///     let trial_id = i.to_string();
///     let config = searcher.suggest().unwrap();
///     searcher.register_pending(&trial_id, &config).unwrap();
///     let x = config["x"].as_f64().unwrap();
///     let report = Report::from([
///         ("loss".to_string(), (x - 1.0).powi(2)),
///         ("excess".to_string(), x - 0.5),
///     ]);
///     searcher.update(&trial_id, &config, &report).unwrap();
/// }
/// assert_eq!(searcher.num_observations().unwrap(), 6);
/// ```
pub struct GpSearcher {
    metric: String,
    constraint_attr: Option<String>,
    kind: SearcherKind,
    inner: Mutex<Lifecycle>,
}

enum Lifecycle {
    Active(Box<SearcherCore>),
    Retired,
}

impl Lifecycle {
    fn active(&self) -> Result<&SearcherCore> {
        match self {
            Lifecycle::Active(core) => Ok(core.as_ref()),
            Lifecycle::Retired => Err(Error::Retired),
        }
    }

    fn active_mut(&mut self) -> Result<&mut SearcherCore> {
        match self {
            Lifecycle::Active(core) => Ok(core.as_mut()),
            Lifecycle::Retired => Err(Error::Retired),
        }
    }
}

struct SearcherCore {
    args: SearcherArgs,
    ranges: HyperparameterRanges,
    transformer: StateTransformer,
    rng: fastrand::Rng,
    remaining_points: VecDeque<Configuration>,
    num_suggestions: usize,
    optimizer: CandidateOptimizer,
}

impl GpSearcher {
    /// Returns a builder for a searcher over `space` optimizing `metric`.
    #[must_use]
    pub fn builder(space: SearchSpace, metric: impl Into<String>) -> GpSearcherBuilder {
        GpSearcherBuilder::new(space, metric)
    }

    /// Creates a standard searcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the options or the search space are invalid.
    pub fn new(
        space: SearchSpace,
        metric: impl Into<String>,
        points_to_evaluate: Vec<Configuration>,
        options: SearchOptions,
    ) -> Result<Self> {
        Self::builder(space, metric)
            .points_to_evaluate(points_to_evaluate)
            .options(options)
            .build()
    }

    /// Creates a constrained searcher. `options.constraint_attr` must name
    /// the constraint metric.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `constraint_attr` is absent, or
    /// another error if the options or the search space are invalid.
    pub fn constrained(
        space: SearchSpace,
        metric: impl Into<String>,
        points_to_evaluate: Vec<Configuration>,
        options: SearchOptions,
    ) -> Result<Self> {
        Self::builder(space, metric)
            .kind(SearcherKind::Constrained)
            .points_to_evaluate(points_to_evaluate)
            .options(options)
            .build()
    }

    pub(crate) fn from_parts(
        args: SearcherArgs,
        objective: Box<dyn Estimator>,
        constraint: Box<dyn Estimator>,
        state: Option<SearcherState>,
    ) -> Result<Self> {
        let models = match args.kind {
            SearcherKind::Standard => OutputModels::Single { objective },
            SearcherKind::Constrained => OutputModels::Constrained {
                objective,
                constraint,
            },
        };
        let core = SearcherCore::new(args, models, state.unwrap_or_default())?;
        Ok(Self::wrap(core))
    }

    fn wrap(core: SearcherCore) -> Self {
        let constraint_attr = match core.args.kind {
            SearcherKind::Standard => None,
            SearcherKind::Constrained => core.args.options.constraint_attr.clone(),
        };
        Self {
            metric: core.args.metric.clone(),
            constraint_attr,
            kind: core.args.kind,
            inner: Mutex::new(Lifecycle::Active(Box::new(core))),
        }
    }

    /// The objective metric name.
    #[must_use]
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// The constraint attribute, for constrained searchers.
    #[must_use]
    pub fn constraint_attr(&self) -> Option<&str> {
        self.constraint_attr.as_deref()
    }

    /// The searcher variant.
    #[must_use]
    pub fn kind(&self) -> SearcherKind {
        self.kind
    }

    /// Whether the searcher was retired by a clone.
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        match *self.inner.lock() {
            Lifecycle::Active(_) => LifecycleState::Active,
            Lifecycle::Retired => LifecycleState::Retired,
        }
    }

    /// Shorthand for `lifecycle() == LifecycleState::Retired`.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.lifecycle() == LifecycleState::Retired
    }

    /// Proposes the next configuration to evaluate.
    ///
    /// Initial points are returned first, then random configurations until
    /// enough observations exist, then the maximizer of the acquisition
    /// criterion over the fitted surrogates. The searcher state is not
    /// changed; call [`register_pending`](Self::register_pending) once the
    /// trial starts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Retired`] after `clone_from_state`, or
    /// [`Error::SpaceExhausted`] if duplicates are disallowed and no unused
    /// configuration could be found.
    pub fn suggest(&self) -> Result<Configuration> {
        self.inner.lock().active_mut()?.suggest()
    }

    /// Records the result of a trial.
    ///
    /// The standard variant requires the objective metric. The constrained
    /// variant requires the constraint attribute; the objective is
    /// optional, so that a trial may report it on its own through
    /// [`update_partial`](Self::update_partial).
    ///
    /// Nothing is recorded if the call fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingMetric`] if a required metric is absent,
    /// [`Error::NonFiniteMetric`] for NaN or infinite values,
    /// [`Error::InconsistentConfig`] if `config` differs from the one
    /// recorded for the trial, or [`Error::Retired`].
    pub fn update(&self, trial_id: &str, config: &Configuration, result: &Report) -> Result<()> {
        self.inner.lock().active_mut()?.update(trial_id, config, result)
    }

    /// Records whichever of the searcher's metrics `result` contains,
    /// without requiring any of them.
    ///
    /// # Errors
    ///
    /// Same as [`update`](Self::update), except that missing metrics are
    /// not an error.
    pub fn update_partial(
        &self,
        trial_id: &str,
        config: &Configuration,
        result: &Report,
    ) -> Result<()> {
        self.inner
            .lock()
            .active_mut()?
            .update_partial(trial_id, config, result)
    }

    /// Registers a started trial so its configuration is not suggested again.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or conflicts with the one
    /// recorded for the trial, or [`Error::Retired`].
    pub fn register_pending(&self, trial_id: &str, config: &Configuration) -> Result<()> {
        self.inner
            .lock()
            .active_mut()?
            .transformer
            .register_pending(trial_id, config)
    }

    /// Marks a trial as failed. Its configuration is not suggested again and
    /// any data it reported is excluded from fitting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTrial`] if the trial was never registered or
    /// labelled, or [`Error::Retired`].
    pub fn evaluation_failed(&self, trial_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let core = inner.active_mut()?;
        if core.args.options.debug_log {
            trace_info!(trial_id, "evaluation failed");
        }
        core.transformer.mark_failed(trial_id)
    }

    /// Excludes a trial's data from subsequent model fits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTrial`] if the trial is unknown, or
    /// [`Error::Retired`].
    pub fn mark_skip_optimization(&self, trial_id: &str) -> Result<()> {
        self.inner
            .lock()
            .active_mut()?
            .transformer
            .mark_skip_optimization(trial_id)
    }

    /// Evaluation records in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Retired`].
    pub fn trials(&self) -> Result<Vec<TrialEvaluations>> {
        Ok(self
            .inner
            .lock()
            .active()?
            .transformer
            .state()
            .records()
            .to_vec())
    }

    /// A copy of the current searcher state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Retired`].
    pub fn state(&self) -> Result<SearcherState> {
        Ok(self.inner.lock().active()?.transformer.state().clone())
    }

    /// Number of observations usable for the objective model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Retired`].
    pub fn num_observations(&self) -> Result<usize> {
        Ok(self
            .inner
            .lock()
            .active()?
            .transformer
            .num_objective_observations())
    }

    /// Number of suggestions handed out so far.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Retired`].
    pub fn num_suggestions(&self) -> Result<usize> {
        Ok(self.inner.lock().active()?.num_suggestions)
    }

    /// Captures everything needed to continue the search elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Retired`], or [`Error::Decode`] if the state cannot
    /// be encoded.
    pub fn get_state(&self) -> Result<SearcherSnapshot> {
        let inner = self.inner.lock();
        let core = inner.active()?;
        let state = core.transformer.state();
        Ok(SearcherSnapshot {
            version: SNAPSHOT_VERSION,
            state: state.encode()?,
            skip_optimization: state.skip_optimization().clone(),
            random_state: core.rng.get_seed(),
            num_suggestions: core.num_suggestions,
            remaining_points: core.remaining_points.iter().cloned().collect(),
            last_hp_fit: core.transformer.last_hp_fit(),
        })
    }

    /// Creates a new searcher from `snapshot` and retires this one.
    ///
    /// The clone is built with the same arguments and inherits the
    /// estimators with everything they have learned, so it continues the
    /// search where this searcher would. Afterwards every operation on
    /// `self` returns [`Error::Retired`].
    ///
    /// If decoding fails, `self` stays usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Retired`] if `self` is already retired, or a decode
    /// or validation error if `snapshot` does not fit this searcher.
    pub fn clone_from_state(&self, snapshot: &SearcherSnapshot) -> Result<GpSearcher> {
        let mut inner = self.inner.lock();
        let core = inner.active()?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::Decode(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let mut state = decode_state(&snapshot.state, &core.ranges)?;
        if let Some(unknown) = snapshot
            .skip_optimization
            .iter()
            .find(|id| state.config(id).is_none())
        {
            return Err(Error::UnknownTrial(unknown.clone()));
        }
        state.set_skip_optimization(snapshot.skip_optimization.clone());
        let remaining = snapshot
            .remaining_points
            .iter()
            .map(|point| core.ranges.validate(point))
            .collect::<Result<VecDeque<_>>>()?;

        let models = core.transformer.estimators().clone();
        let mut clone = SearcherCore::new(core.args.clone(), models, state)?;
        clone.rng = fastrand::Rng::with_seed(snapshot.random_state);
        clone.num_suggestions = snapshot.num_suggestions;
        clone.remaining_points = remaining;
        clone.transformer.set_last_hp_fit(snapshot.last_hp_fit);

        if core.args.options.debug_log {
            trace_info!(
                num_trials = clone.transformer.state().len(),
                "searcher cloned from state, retiring original"
            );
        }
        *inner = Lifecycle::Retired;
        Ok(Self::wrap(clone))
    }
}

impl core::fmt::Debug for GpSearcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GpSearcher")
            .field("metric", &self.metric)
            .field("constraint_attr", &self.constraint_attr)
            .field("kind", &self.kind)
            .field("lifecycle", &self.lifecycle())
            .finish_non_exhaustive()
    }
}

impl SearcherCore {
    fn new(args: SearcherArgs, models: OutputModels, state: SearcherState) -> Result<Self> {
        let ranges = HyperparameterRanges::new(&args.space)?;
        let remaining_points = args
            .points_to_evaluate
            .iter()
            .map(|point| ranges.fill_with_midpoints(point))
            .collect::<Result<VecDeque<_>>>()?;
        let rng = args
            .options
            .random_seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        let mut transformer = StateTransformer::new(
            state,
            ranges.clone(),
            models,
            args.metric.clone(),
            args.options.mode,
            args.options.opt_skip_period,
        );
        transformer.set_debug_log(args.options.debug_log);
        let optimizer = CandidateOptimizer {
            num_candidates: args.options.num_init_candidates,
            min_feasibility: args.options.min_feasibility,
            allow_duplicates: args.options.allow_duplicates,
        };
        Ok(Self {
            args,
            ranges,
            transformer,
            rng,
            remaining_points,
            num_suggestions: 0,
            optimizer,
        })
    }

    fn suggest(&mut self) -> Result<Configuration> {
        let config = if let Some(point) = self.remaining_points.pop_front() {
            point
        } else if self.transformer.num_objective_observations() < self.args.options.num_init_random
        {
            self.random_config().ok_or(Error::SpaceExhausted)?
        } else {
            self.model_based_config()?
        };
        self.num_suggestions += 1;
        if self.args.options.debug_log {
            trace_info!(
                num_suggestions = self.num_suggestions,
                config = %config_key(&config),
                "suggest"
            );
        }
        Ok(config)
    }

    fn model_based_config(&mut self) -> Result<Configuration> {
        let taken = self.transformer.state().taken_config_keys();
        let fitted = self.transformer.fitted_models()?;
        let ctx = fitted.context();
        if ctx.can_score()
            && let Some((config, score)) =
                self.optimizer
                    .select(&ctx, &self.ranges, &mut self.rng, &taken)
        {
            if self.args.options.debug_log {
                trace_debug!(
                    acquisition = score.value,
                    p_feasible = score.p_feasible,
                    "selected candidate"
                );
            }
            debug_assert!((0.0..=1.0).contains(&score.p_feasible));
            return Ok(config);
        }
        self.random_config().ok_or(Error::SpaceExhausted)
    }

    fn random_config(&mut self) -> Option<Configuration> {
        if self.args.options.allow_duplicates {
            return Some(self.ranges.random_config(&mut self.rng));
        }
        let taken = self.transformer.state().taken_config_keys();
        (0..MAX_RANDOM_RETRIES)
            .map(|_| self.ranges.random_config(&mut self.rng))
            .find(|config| !taken.contains(&config_key(config)))
    }

    fn update(&mut self, trial_id: &str, config: &Configuration, result: &Report) -> Result<()> {
        let missing = |name: &str| Error::MissingMetric {
            trial_id: trial_id.to_owned(),
            name: name.to_owned(),
        };
        match self.args.kind {
            SearcherKind::Standard => {
                if !result.contains_key(&self.args.metric) {
                    return Err(missing(&self.args.metric));
                }
            }
            SearcherKind::Constrained => {
                if let Some(attr) = self.args.options.constraint_attr.as_deref()
                    && !result.contains_key(attr)
                {
                    return Err(missing(attr));
                }
            }
        }
        self.update_partial(trial_id, config, result)
    }

    fn update_partial(
        &mut self,
        trial_id: &str,
        config: &Configuration,
        result: &Report,
    ) -> Result<()> {
        let mut metrics = BTreeMap::new();
        if let Some(&value) = result.get(&self.args.metric) {
            metrics.insert(self.args.metric.clone(), value);
        }
        if self.args.kind == SearcherKind::Constrained
            && let Some(attr) = self.args.options.constraint_attr.as_deref()
            && let Some(&value) = result.get(attr)
        {
            if self.args.options.debug_log {
                trace_info!(trial_id, constraint = value, "update constraint");
            }
            metrics.insert(INTERNAL_CONSTRAINT_NAME.to_owned(), value);
        }
        if metrics.is_empty() {
            return Ok(());
        }
        self.transformer
            .label_trial(TrialEvaluations::new(trial_id, metrics), Some(config))
    }
}
