//! Search space description and configuration values.
//!
//! A [`SearchSpace`] maps parameter names to a [`Domain`]. Concrete
//! [`Configuration`]s draw one [`ParamValue`] per parameter. The
//! [`HyperparameterRanges`] built from a space encode configurations into
//! the unit hypercube the surrogate models work in.
//!
//! # Example
//!
//! ```
//! use gp_searcher::space::{HyperparameterRanges, SearchSpace};
//!
//! let space = SearchSpace::new()
//!     .log_float("lr", 1e-5, 1e-1)
//!     .int("layers", 1, 8)
//!     .categorical("activation", ["relu", "tanh"]);
//! let ranges = HyperparameterRanges::new(&space).unwrap();
//! assert_eq!(ranges.ndarray_size(), 4);
//! ```

mod ranges;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use ranges::HyperparameterRanges;
pub(crate) use ranges::config_key;

/// A concrete value for one parameter.
///
/// Serialized untagged, so a configuration reads as plain JSON:
/// `{"lr": 0.01, "layers": 3, "activation": "relu"}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// An integer value.
    Int(i64),
    /// A floating-point value.
    Float(f64),
    /// One of a categorical parameter's choices.
    Categorical(String),
}

impl ParamValue {
    /// Numeric view of the value, if it has one.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Categorical(_) => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Categorical(v.to_owned())
    }
}

impl core::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Categorical(v) => write!(f, "{v}"),
        }
    }
}

/// A mapping from parameter name to value. Immutable once assigned to a trial.
pub type Configuration = BTreeMap<String, ParamValue>;

/// The domain of a single parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Domain {
    /// Real values in `[low, high]`, optionally sampled in log space.
    Float {
        /// Lower bound (inclusive).
        low: f64,
        /// Upper bound (inclusive).
        high: f64,
        /// Whether to model the parameter in log space.
        #[serde(default)]
        log: bool,
    },
    /// Integers in `[low, high]`, optionally sampled in log space.
    Int {
        /// Lower bound (inclusive).
        low: i64,
        /// Upper bound (inclusive).
        high: i64,
        /// Whether to model the parameter in log space.
        #[serde(default)]
        log: bool,
    },
    /// A finite set of unordered choices.
    Categorical {
        /// The available choices.
        choices: Vec<String>,
    },
    /// A constant carried in every configuration but not modelled.
    Fixed {
        /// The constant value.
        value: ParamValue,
    },
}

impl Domain {
    /// Number of coordinates this domain occupies in the encoded vector.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        match self {
            Domain::Float { .. } | Domain::Int { .. } => 1,
            Domain::Categorical { choices } => choices.len(),
            Domain::Fixed { .. } => 0,
        }
    }
}

/// An ordered collection of named parameter domains.
///
/// Parameters are kept sorted by name, which fixes the encoding order.
/// Bounds are checked when the space is turned into
/// [`HyperparameterRanges`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchSpace {
    params: BTreeMap<String, Domain>,
}

impl SearchSpace {
    /// Creates an empty search space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter with an explicit domain.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, domain: Domain) -> Self {
        self.params.insert(name.into(), domain);
        self
    }

    /// Adds a uniform real parameter.
    #[must_use]
    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.with(
            name,
            Domain::Float {
                low,
                high,
                log: false,
            },
        )
    }

    /// Adds a log-uniform real parameter.
    #[must_use]
    pub fn log_float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.with(
            name,
            Domain::Float {
                low,
                high,
                log: true,
            },
        )
    }

    /// Adds a uniform integer parameter.
    #[must_use]
    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.with(
            name,
            Domain::Int {
                low,
                high,
                log: false,
            },
        )
    }

    /// Adds a log-uniform integer parameter.
    #[must_use]
    pub fn log_int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.with(
            name,
            Domain::Int {
                low,
                high,
                log: true,
            },
        )
    }

    /// Adds a categorical parameter.
    #[must_use]
    pub fn categorical<I, S>(self, name: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(
            name,
            Domain::Categorical {
                choices: choices.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Adds a constant parameter.
    #[must_use]
    pub fn fixed(self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.with(
            name,
            Domain::Fixed {
                value: value.into(),
            },
        )
    }

    /// Looks up a parameter's domain.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Domain> {
        self.params.get(name)
    }

    /// Iterates parameters in encoding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Domain)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if the space has no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
