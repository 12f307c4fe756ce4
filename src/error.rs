/// Errors returned by the searcher and its building blocks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned at construction when a required search option is absent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Returned by `update` when the reported result lacks a metric the
    /// searcher needs, such as the constraint attribute.
    #[error(
        "metric '{name}' not included in reported result for trial '{trial_id}'. \
         Make sure your evaluation function reports it"
    )]
    MissingMetric {
        /// The trial that reported the result.
        trial_id: String,
        /// The name of the missing metric.
        name: String,
    },

    /// Returned when a searcher is used after its state was handed to a clone.
    #[error("searcher has been retired by clone_from_state and must not be used")]
    Retired,

    /// Returned when a configuration names a parameter the search space lacks.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    /// Returned when a configuration is missing a parameter of the search space.
    #[error("configuration is missing parameter '{0}'")]
    MissingParameter(String),

    /// Returned when a value does not belong to its parameter's domain.
    #[error("invalid value for parameter '{name}': {reason}")]
    InvalidValue {
        /// The parameter name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Returned when the lower bound is greater than the upper bound.
    #[error("invalid bounds for '{name}': low ({low}) must be less than or equal to high ({high})")]
    InvalidBounds {
        /// The parameter name.
        name: String,
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when log scale is used with non-positive bounds.
    #[error("invalid log bounds for '{0}': low must be positive for log scale")]
    InvalidLogBounds(String),

    /// Returned when categorical choices are empty.
    #[error("categorical choices for '{0}' cannot be empty")]
    EmptyChoices(String),

    /// Returned when a search space has no parameters.
    #[error("search space has no parameters")]
    EmptySearchSpace,

    /// Returned when no configuration outside the already-used ones can be
    /// found and duplicates are not allowed.
    #[error("no unused configuration left in the search space")]
    SpaceExhausted,

    /// Returned when an operation refers to a trial the state does not know.
    #[error("unknown trial '{0}'")]
    UnknownTrial(String),

    /// Returned when a trial is labelled with a configuration that differs
    /// from the one already recorded for it.
    #[error("configuration for trial '{0}' differs from the recorded one")]
    InconsistentConfig(String),

    /// Returned when a reported metric value is NaN or infinite.
    #[error("metric '{name}' of trial '{trial_id}' is not finite: {value}")]
    NonFiniteMetric {
        /// The trial that reported the value.
        trial_id: String,
        /// The metric name.
        name: String,
        /// The offending value.
        value: f64,
    },

    /// Returned when a training set and a model disagree on dimensions.
    #[error("dimension mismatch: expected {expected} features, got {got}")]
    DimensionMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features.
        got: usize,
    },

    /// Returned when the kernel matrix cannot be factorized.
    #[error("surrogate fit failed: {0}")]
    ModelFit(&'static str),

    /// Returned when an encoded searcher state cannot be decoded.
    #[error("cannot decode searcher state: {0}")]
    Decode(String),

    /// Returned when a snapshot file cannot be read or written.
    #[error("persistence error: {0}")]
    Persistence(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}
