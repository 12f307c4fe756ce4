use serde::{Deserialize, Serialize};

use super::{GpSearcher, SearcherArgs};
use crate::error::{Error, Result};
use crate::model::{Estimator, GpEstimator, gp};
use crate::space::{Configuration, SearchSpace};
use crate::state::INTERNAL_CONSTRAINT_NAME;
use crate::types::{Mode, SearcherKind};

/// Default number of labelled trials before GP-guided suggestions begin.
pub const DEFAULT_NUM_INIT_RANDOM: usize = 3;
/// Default number of random candidates scored per suggestion.
pub const DEFAULT_NUM_INIT_CANDIDATES: usize = 250;
/// Default minimum predicted feasibility for a candidate to be eligible.
pub const DEFAULT_MIN_FEASIBILITY: f64 = 1e-3;

/// Search options shared by both searcher variants.
///
/// Every field has a default, so options can be read from a partial JSON
/// object:
///
/// ```
/// use gp_searcher::SearchOptions;
///
/// let options: SearchOptions =
///     serde_json::from_str(r#"{"constraint_attr": "memory", "random_seed": 7}"#).unwrap();
/// assert_eq!(options.constraint_attr.as_deref(), Some("memory"));
/// assert_eq!(options.num_init_random, 3);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Name of the constraint metric in reported results. Required for
    /// [`SearcherKind::Constrained`].
    pub constraint_attr: Option<String>,
    /// Whether the objective is minimized or maximized.
    pub mode: Mode,
    /// RNG seed; random when absent.
    pub random_seed: Option<u64>,
    /// Labelled trials required before the surrogate drives suggestions.
    pub num_init_random: usize,
    /// Random candidates scored per suggestion.
    pub num_init_candidates: usize,
    /// Whether configurations may be suggested more than once.
    pub allow_duplicates: bool,
    /// Hyperparameters are re-estimated only every this many new
    /// observations.
    pub opt_skip_period: usize,
    /// Observation noise variance of the GP surrogates.
    pub noise_variance: f64,
    /// Most recent observations used per fit.
    pub max_train_points: usize,
    /// Candidates predicted feasible with lower probability are excluded.
    pub min_feasibility: f64,
    /// Emit per-update and per-refit diagnostics.
    pub debug_log: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            constraint_attr: None,
            mode: Mode::Min,
            random_seed: None,
            num_init_random: DEFAULT_NUM_INIT_RANDOM,
            num_init_candidates: DEFAULT_NUM_INIT_CANDIDATES,
            allow_duplicates: false,
            opt_skip_period: 1,
            noise_variance: gp::DEFAULT_NOISE_VAR,
            max_train_points: gp::DEFAULT_MAX_TRAIN_POINTS,
            min_feasibility: DEFAULT_MIN_FEASIBILITY,
            debug_log: false,
        }
    }
}

impl SearchOptions {
    /// Checks the options for `kind` and `metric`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a required option is missing or
    /// a value is out of range.
    pub fn validate(&self, kind: SearcherKind, metric: &str) -> Result<()> {
        if metric.is_empty() {
            return Err(Error::Configuration("metric name must not be empty".into()));
        }
        if metric == INTERNAL_CONSTRAINT_NAME {
            return Err(Error::Configuration(format!(
                "metric name '{metric}' is reserved for internal use"
            )));
        }
        if kind == SearcherKind::Constrained {
            let Some(attr) = self.constraint_attr.as_deref() else {
                return Err(Error::Configuration(
                    "this searcher needs a constraint attribute; specify its name in \
                     search options as `constraint_attr`"
                        .into(),
                ));
            };
            if attr.is_empty() || attr == metric {
                return Err(Error::Configuration(format!(
                    "constraint attribute '{attr}' must be non-empty and differ from the metric"
                )));
            }
        }
        if self.num_init_candidates == 0 {
            return Err(Error::Configuration(
                "num_init_candidates must be positive".into(),
            ));
        }
        if self.opt_skip_period == 0 {
            return Err(Error::Configuration("opt_skip_period must be positive".into()));
        }
        if self.max_train_points == 0 {
            return Err(Error::Configuration("max_train_points must be positive".into()));
        }
        if !(self.noise_variance.is_finite() && self.noise_variance > 0.0) {
            return Err(Error::Configuration(format!(
                "noise_variance must be positive, got {}",
                self.noise_variance
            )));
        }
        if !(0.0..1.0).contains(&self.min_feasibility) {
            return Err(Error::Configuration(format!(
                "min_feasibility must be in [0, 1), got {}",
                self.min_feasibility
            )));
        }
        Ok(())
    }
}

/// Builder for [`GpSearcher`].
///
/// # Examples
///
/// ```
/// use gp_searcher::space::SearchSpace;
/// use gp_searcher::GpSearcher;
///
/// let space = SearchSpace::new().float("x", 0.0, 1.0);
/// let searcher = GpSearcher::builder(space, "loss")
///     .constrained("memory")
///     .random_seed(42)
///     .num_init_random(5)
///     .build()
///     .unwrap();
/// assert_eq!(searcher.constraint_attr(), Some("memory"));
/// ```
pub struct GpSearcherBuilder {
    space: SearchSpace,
    metric: String,
    kind: SearcherKind,
    points_to_evaluate: Vec<Configuration>,
    options: SearchOptions,
    objective_estimator: Option<Box<dyn Estimator>>,
    constraint_estimator: Option<Box<dyn Estimator>>,
}

impl GpSearcherBuilder {
    pub(super) fn new(space: SearchSpace, metric: impl Into<String>) -> Self {
        Self {
            space,
            metric: metric.into(),
            kind: SearcherKind::Standard,
            points_to_evaluate: Vec::new(),
            options: SearchOptions::default(),
            objective_estimator: None,
            constraint_estimator: None,
        }
    }

    /// Selects the searcher variant.
    #[must_use]
    pub fn kind(mut self, kind: SearcherKind) -> Self {
        self.kind = kind;
        self
    }

    /// Selects the constrained variant with the given constraint attribute.
    #[must_use]
    pub fn constrained(mut self, constraint_attr: impl Into<String>) -> Self {
        self.kind = SearcherKind::Constrained;
        self.options.constraint_attr = Some(constraint_attr.into());
        self
    }

    /// Replaces all search options.
    #[must_use]
    pub fn options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// Configurations to suggest first, in order. Missing parameters are
    /// filled with domain midpoints.
    #[must_use]
    pub fn points_to_evaluate(mut self, points: Vec<Configuration>) -> Self {
        self.points_to_evaluate = points;
        self
    }

    /// Sets the optimization mode.
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.options.mode = mode;
        self
    }

    /// Sets the RNG seed.
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.options.random_seed = Some(seed);
        self
    }

    /// Sets the number of labelled trials before GP-guided suggestions.
    #[must_use]
    pub fn num_init_random(mut self, n: usize) -> Self {
        self.options.num_init_random = n;
        self
    }

    /// Sets the number of random candidates scored per suggestion.
    #[must_use]
    pub fn num_init_candidates(mut self, n: usize) -> Self {
        self.options.num_init_candidates = n;
        self
    }

    /// Allows configurations to be suggested more than once.
    #[must_use]
    pub fn allow_duplicates(mut self, allow: bool) -> Self {
        self.options.allow_duplicates = allow;
        self
    }

    /// Enables per-update diagnostics.
    #[must_use]
    pub fn debug_log(mut self, enabled: bool) -> Self {
        self.options.debug_log = enabled;
        self
    }

    /// Replaces the objective estimator (a GP by default).
    #[must_use]
    pub fn objective_estimator(mut self, estimator: impl Estimator + 'static) -> Self {
        self.objective_estimator = Some(Box::new(estimator));
        self
    }

    /// Replaces the constraint estimator (a GP by default).
    #[must_use]
    pub fn constraint_estimator(mut self, estimator: impl Estimator + 'static) -> Self {
        self.constraint_estimator = Some(Box::new(estimator));
        self
    }

    /// Builds the searcher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a required search option is
    /// missing (notably `constraint_attr` for the constrained variant), or
    /// a search-space error if the space or a point to evaluate is invalid.
    pub fn build(self) -> Result<GpSearcher> {
        let Self {
            space,
            metric,
            kind,
            points_to_evaluate,
            options,
            objective_estimator,
            constraint_estimator,
        } = self;
        options.validate(kind, &metric)?;
        let args = SearcherArgs {
            space,
            metric,
            kind,
            points_to_evaluate,
            options,
        };
        let default_estimator = || -> Box<dyn Estimator> {
            Box::new(GpEstimator::new(
                args.options.noise_variance,
                args.options.max_train_points,
            ))
        };
        let objective = objective_estimator.unwrap_or_else(default_estimator);
        let constraint = constraint_estimator.unwrap_or_else(default_estimator);
        GpSearcher::from_parts(args, objective, constraint, None)
    }
}
