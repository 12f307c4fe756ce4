use crate::error::{Error, Result};
use crate::rng_util;

use super::{Configuration, Domain, ParamValue, SearchSpace};

/// A validated search space together with its unit-hypercube encoding.
///
/// Numeric parameters take one coordinate each (in log space when the
/// domain asks for it), categorical parameters are one-hot encoded and
/// fixed parameters take none.
#[derive(Clone, Debug, PartialEq)]
pub struct HyperparameterRanges {
    space: SearchSpace,
    entries: Vec<Entry>,
    ndarray_size: usize,
}

#[derive(Clone, Debug, PartialEq)]
struct Entry {
    name: String,
    domain: Domain,
    offset: usize,
    /// Internal-space bounds for numeric domains.
    bounds: Option<(f64, f64)>,
}

impl HyperparameterRanges {
    /// Validates `space` and computes its encoding layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the space is empty, a bound pair is inverted, a
    /// log domain has a non-positive lower bound, or a categorical domain
    /// has no choices.
    pub fn new(space: &SearchSpace) -> Result<Self> {
        if space.is_empty() {
            return Err(Error::EmptySearchSpace);
        }
        let mut entries = Vec::with_capacity(space.len());
        let mut offset = 0;
        for (name, domain) in space.iter() {
            let bounds = validate_domain(name, domain)?;
            entries.push(Entry {
                name: name.to_owned(),
                domain: domain.clone(),
                offset,
                bounds,
            });
            offset += domain.encoded_size();
        }
        Ok(Self {
            space: space.clone(),
            entries,
            ndarray_size: offset,
        })
    }

    /// The search space these ranges were built from.
    #[must_use]
    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    /// Dimension of the encoded vectors.
    #[must_use]
    pub fn ndarray_size(&self) -> usize {
        self.ndarray_size
    }

    /// Checks a configuration against the space and returns its normalized
    /// form: fixed parameters filled in, integral floats for integer
    /// domains turned into integers, integers for real domains widened.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown or missing parameters and for values
    /// outside their domain.
    pub fn validate(&self, config: &Configuration) -> Result<Configuration> {
        if let Some(unknown) = config.keys().find(|k| self.space.get(k).is_none()) {
            return Err(Error::UnknownParameter(unknown.clone()));
        }
        let mut out = Configuration::new();
        for entry in &self.entries {
            let value = match (config.get(&entry.name), &entry.domain) {
                (None, Domain::Fixed { value }) => value.clone(),
                (None, _) => return Err(Error::MissingParameter(entry.name.clone())),
                (Some(v), domain) => normalize_value(&entry.name, v, domain)?,
            };
            out.insert(entry.name.clone(), value);
        }
        Ok(out)
    }

    /// Encodes a configuration into `[0, 1]^d`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_ndarray(&self, config: &Configuration) -> Result<Vec<f64>> {
        let config = self.validate(config)?;
        let mut x = vec![0.0; self.ndarray_size];
        for entry in &self.entries {
            let value = &config[&entry.name];
            match &entry.domain {
                Domain::Float { log, .. } | Domain::Int { log, .. } => {
                    let v = value.as_f64().ok_or_else(|| invalid(&entry.name, "not numeric"))?;
                    let internal = if *log { v.ln() } else { v };
                    let (lo, hi) = entry.bounds.unwrap_or((0.0, 1.0));
                    x[entry.offset] = to_normalized(internal, lo, hi);
                }
                Domain::Categorical { choices } => {
                    if let ParamValue::Categorical(c) = value
                        && let Some(pos) = choices.iter().position(|choice| choice == c)
                    {
                        x[entry.offset + pos] = 1.0;
                    }
                }
                Domain::Fixed { .. } => {}
            }
        }
        Ok(x)
    }

    /// Decodes a point of `[0, 1]^d` back into a configuration.
    ///
    /// Coordinates are clamped to the unit interval, integers are rounded
    /// and categoricals take the arg-max of their one-hot block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `x` has the wrong length.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_ndarray(&self, x: &[f64]) -> Result<Configuration> {
        if x.len() != self.ndarray_size {
            return Err(Error::DimensionMismatch {
                expected: self.ndarray_size,
                got: x.len(),
            });
        }
        let mut config = Configuration::new();
        for entry in &self.entries {
            let value = match &entry.domain {
                Domain::Float { low, high, log } => {
                    let (lo, hi) = entry.bounds.unwrap_or((0.0, 1.0));
                    let internal = from_normalized(x[entry.offset].clamp(0.0, 1.0), lo, hi);
                    let v = if *log { internal.exp() } else { internal };
                    ParamValue::Float(v.clamp(*low, *high))
                }
                Domain::Int { low, high, log } => {
                    let (lo, hi) = entry.bounds.unwrap_or((0.0, 1.0));
                    let internal = from_normalized(x[entry.offset].clamp(0.0, 1.0), lo, hi);
                    let v = if *log { internal.exp() } else { internal };
                    ParamValue::Int((v.round() as i64).clamp(*low, *high))
                }
                Domain::Categorical { choices } => {
                    let block = &x[entry.offset..entry.offset + choices.len()];
                    let best = block
                        .iter()
                        .enumerate()
                        .max_by(|a, b| a.1.total_cmp(b.1))
                        .map_or(0, |(i, _)| i);
                    ParamValue::Categorical(choices[best].clone())
                }
                Domain::Fixed { value } => value.clone(),
            };
            config.insert(entry.name.clone(), value);
        }
        Ok(config)
    }

    /// Draws a configuration uniformly at random (log-uniform for log domains).
    #[allow(clippy::cast_possible_truncation)]
    pub fn random_config(&self, rng: &mut fastrand::Rng) -> Configuration {
        let mut config = Configuration::new();
        for entry in &self.entries {
            let value = match &entry.domain {
                Domain::Float { low, high, log } => {
                    let (lo, hi) = entry.bounds.unwrap_or((*low, *high));
                    let internal = rng_util::f64_range(rng, lo, hi);
                    let v = if *log { internal.exp() } else { internal };
                    ParamValue::Float(v.clamp(*low, *high))
                }
                Domain::Int { low, high, log } => {
                    if *log {
                        let (lo, hi) = entry.bounds.unwrap_or((0.0, 0.0));
                        let v = rng_util::f64_range(rng, lo, hi).exp().round() as i64;
                        ParamValue::Int(v.clamp(*low, *high))
                    } else {
                        ParamValue::Int(rng.i64(*low..=*high))
                    }
                }
                Domain::Categorical { choices } => {
                    ParamValue::Categorical(choices[rng.usize(0..choices.len())].clone())
                }
                Domain::Fixed { value } => value.clone(),
            };
            config.insert(entry.name.clone(), value);
        }
        config
    }

    /// Completes a partial configuration with the midpoint of each missing
    /// parameter's domain (first choice for categoricals).
    ///
    /// # Errors
    ///
    /// Returns an error if the partial configuration names unknown
    /// parameters or carries out-of-domain values.
    #[allow(clippy::cast_possible_truncation)]
    pub fn fill_with_midpoints(&self, partial: &Configuration) -> Result<Configuration> {
        let mut config = partial.clone();
        for entry in &self.entries {
            if config.contains_key(&entry.name) {
                continue;
            }
            let value = match &entry.domain {
                Domain::Float { log, .. } => {
                    let (lo, hi) = entry.bounds.unwrap_or((0.0, 1.0));
                    let mid = 0.5 * (lo + hi);
                    ParamValue::Float(if *log { mid.exp() } else { mid })
                }
                Domain::Int { low, high, log } => {
                    let (lo, hi) = entry.bounds.unwrap_or((0.0, 1.0));
                    let mid = 0.5 * (lo + hi);
                    let v = if *log { mid.exp() } else { mid };
                    ParamValue::Int((v.round() as i64).clamp(*low, *high))
                }
                Domain::Categorical { choices } => ParamValue::Categorical(choices[0].clone()),
                Domain::Fixed { value } => value.clone(),
            };
            config.insert(entry.name.clone(), value);
        }
        self.validate(&config)
    }
}

/// A stable textual key for duplicate detection.
#[must_use]
pub(crate) fn config_key(config: &Configuration) -> String {
    config
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(";")
}

fn invalid(name: &str, reason: impl Into<String>) -> Error {
    Error::InvalidValue {
        name: name.to_owned(),
        reason: reason.into(),
    }
}

/// Check a domain and compute its internal-space bounds.
#[allow(clippy::cast_precision_loss)]
fn validate_domain(name: &str, domain: &Domain) -> Result<Option<(f64, f64)>> {
    match domain {
        Domain::Float { low, high, log } => {
            if low.is_nan() || high.is_nan() || low > high {
                return Err(Error::InvalidBounds {
                    name: name.to_owned(),
                    low: *low,
                    high: *high,
                });
            }
            if *log {
                if *low <= 0.0 {
                    return Err(Error::InvalidLogBounds(name.to_owned()));
                }
                Ok(Some((low.ln(), high.ln())))
            } else {
                Ok(Some((*low, *high)))
            }
        }
        Domain::Int { low, high, log } => {
            if low > high {
                return Err(Error::InvalidBounds {
                    name: name.to_owned(),
                    low: *low as f64,
                    high: *high as f64,
                });
            }
            if *log {
                if *low < 1 {
                    return Err(Error::InvalidLogBounds(name.to_owned()));
                }
                Ok(Some(((*low as f64).ln(), (*high as f64).ln())))
            } else {
                Ok(Some((*low as f64, *high as f64)))
            }
        }
        Domain::Categorical { choices } => {
            if choices.is_empty() {
                return Err(Error::EmptyChoices(name.to_owned()));
            }
            Ok(None)
        }
        Domain::Fixed { .. } => Ok(None),
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn normalize_value(name: &str, value: &ParamValue, domain: &Domain) -> Result<ParamValue> {
    match domain {
        Domain::Float { low, high, .. } => {
            let v = value
                .as_f64()
                .ok_or_else(|| invalid(name, "expected a number"))?;
            if !v.is_finite() || v < *low || v > *high {
                return Err(invalid(name, format!("{v} outside [{low}, {high}]")));
            }
            Ok(ParamValue::Float(v))
        }
        Domain::Int { low, high, .. } => {
            let v = match value {
                ParamValue::Int(v) => *v,
                ParamValue::Float(f) if f.fract() == 0.0 && f.is_finite() => *f as i64,
                _ => return Err(invalid(name, "expected an integer")),
            };
            if v < *low || v > *high {
                return Err(invalid(name, format!("{v} outside [{low}, {high}]")));
            }
            Ok(ParamValue::Int(v))
        }
        Domain::Categorical { choices } => match value {
            ParamValue::Categorical(c) if choices.contains(c) => Ok(value.clone()),
            other => Err(invalid(name, format!("'{other}' is not one of {choices:?}"))),
        },
        Domain::Fixed { value: fixed } => {
            if fixed == value {
                Ok(value.clone())
            } else {
                Err(invalid(name, format!("expected fixed value {fixed}")))
            }
        }
    }
}

/// Convert an internal-space value to normalized [0, 1] using bounds.
fn to_normalized(value: f64, lo: f64, hi: f64) -> f64 {
    if (hi - lo).abs() < 1e-15 {
        0.5
    } else {
        (value - lo) / (hi - lo)
    }
}

/// Convert a normalized [0, 1] value back to internal space.
fn from_normalized(value: f64, lo: f64, hi: f64) -> f64 {
    lo + value * (hi - lo)
}
