#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Asynchronous, constraint-aware Bayesian optimization for hyperparameter
//! tuning. A [`GpSearcher`] proposes configurations, ingests results as
//! they arrive from any number of workers, and ranks candidates by expected
//! improvement over Gaussian-process surrogates. The constrained variant
//! fits a second surrogate for a constraint metric and only promotes
//! configurations predicted to satisfy it.
//!
//! # Getting Started
//!
//! ```
//! use gp_searcher::prelude::*;
//!
//! let space = SearchSpace::new()
//!     .log_float("lr", 1e-4, 1e-1)
//!     .int("layers", 1, 4);
//! let searcher = GpSearcher::builder(space, "val_loss")
//!     .constrained("memory_excess")
//!     .random_seed(42)
//!     .build()
//!     .unwrap();
//!
//! for i in 0..8 {
//!     let trial_id = format!("trial-{i}");
//!     let config = searcher.suggest().unwrap();
//!     searcher.register_pending(&trial_id, &config).unwrap();
//!
//!     let lr = config["lr"].as_f64().unwrap();
//!     let layers = config["layers"].as_f64().unwrap();
//!     let report = Report::from([
//!         ("val_loss".to_string(), (lr.log10() + 2.5).powi(2)),
//!         ("memory_excess".to_string(), layers - 3.0),
//!     ]);
//!     searcher.update(&trial_id, &config, &report).unwrap();
//! }
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`GpSearcher`] | Thread-safe façade: `suggest`, `update`, `get_state`, `clone_from_state`. |
//! | [`SearchSpace`](space::SearchSpace) | Named parameter domains: float, int, categorical, fixed. |
//! | [`SearcherState`](state::SearcherState) | Trial records plus failed, pending and skip-optimization bookkeeping. |
//! | [`StateTransformer`](transformer::StateTransformer) | Sole mutator of the state; refits surrogates lazily. |
//! | [`Estimator`](model::Estimator) | Fits a [`Predictor`](model::Predictor); GP by default. |
//! | [`SearcherSnapshot`] | Serializable searcher state for hand-off and persistence. |
//!
//! # Constraints
//!
//! The constraint attribute is feasible when its reported value is `<= 0`.
//! It is stored under [`INTERNAL_CONSTRAINT_NAME`](state::INTERNAL_CONSTRAINT_NAME)
//! so it cannot collide with a user metric. Before any feasible observation
//! exists, candidates are ranked by their probability of feasibility alone.
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) for updates, refits and suggestions | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

pub mod acquisition;
mod error;
pub mod model;
mod rng_util;
mod searcher;
pub mod space;
pub mod state;
pub mod transformer;
mod types;

pub use error::{Error, Result};
pub use searcher::{
    DEFAULT_MIN_FEASIBILITY, DEFAULT_NUM_INIT_CANDIDATES, DEFAULT_NUM_INIT_RANDOM, GpSearcher,
    GpSearcherBuilder, Report, SNAPSHOT_VERSION, SearchOptions, SearcherSnapshot,
};
pub use types::{LifecycleState, Mode, SearcherKind};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use gp_searcher::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::model::{Estimator, GpEstimator, Prediction, Predictor, TrainingData};
    pub use crate::searcher::{GpSearcher, GpSearcherBuilder, Report, SearchOptions, SearcherSnapshot};
    pub use crate::space::{Configuration, Domain, ParamValue, SearchSpace};
    pub use crate::state::{SearcherState, TrialEvaluations};
    pub use crate::types::{LifecycleState, Mode, SearcherKind};
}
