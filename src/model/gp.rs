//! Gaussian process estimator with a Matérn 5/2 ARD kernel.
//!
//! Targets are standardized (zero mean, unit variance) before fitting and
//! predictions are mapped back to the original units. Only the most recent
//! `max_train_points` rows are used to keep the O(n³) Cholesky cost
//! bounded.
//!
//! # Hyperparameters
//!
//! Lengthscales start at the per-dimension standard deviation of the
//! training inputs and are then scaled by the factor from
//! [`LENGTHSCALE_GRID`] that maximizes the log marginal likelihood. When a
//! fit is asked not to update hyperparameters the previous ones are reused
//! and only the posterior is recomputed.
//!
//! # Examples
//!
//! ```
//! use gp_searcher::model::{Estimator, GpEstimator, TrainingData};
//!
//! let data = TrainingData {
//!     x: vec![vec![0.0], vec![0.5], vec![1.0]],
//!     y: vec![1.0, 0.0, 1.0],
//! };
//! let mut estimator = GpEstimator::default();
//! let predictor = estimator.fit(&data, true).unwrap();
//! let at_min = predictor.predict(&[0.5]);
//! assert!((at_min.mean - 0.0).abs() < 1e-2);
//! ```

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::{Estimator, Predictor, Prediction, TrainingData};
use crate::error::{Error, Result};

/// Default observation noise variance.
pub const DEFAULT_NOISE_VAR: f64 = 1e-6;
/// Default cap on training rows.
pub const DEFAULT_MAX_TRAIN_POINTS: usize = 100;

/// Scale factors tried for the lengthscales during hyperparameter fitting.
const LENGTHSCALE_GRID: [f64; 6] = [0.25, 0.5, 1.0, 2.0, 4.0, 8.0];
/// Jitter multipliers tried when the kernel matrix is not positive definite.
const JITTER_STEPS: [f64; 4] = [1.0, 10.0, 100.0, 1000.0];

/// Precomputed √5 constant.
const SQRT_5: f64 = 2.236_067_977_499_79;

/// Learned kernel hyperparameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpHyperparameters {
    /// ARD lengthscales, one per encoded dimension.
    pub lengthscales: Vec<f64>,
    /// Signal variance (on the standardized scale).
    pub signal_variance: f64,
}

/// Gaussian process estimator.
#[derive(Clone, Debug)]
pub struct GpEstimator {
    noise_variance: f64,
    max_train_points: usize,
    hyperparameters: Option<GpHyperparameters>,
}

impl Default for GpEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE_VAR, DEFAULT_MAX_TRAIN_POINTS)
    }
}

impl GpEstimator {
    /// Creates an estimator with no learned hyperparameters yet.
    #[must_use]
    pub fn new(noise_variance: f64, max_train_points: usize) -> Self {
        Self {
            noise_variance,
            max_train_points: max_train_points.max(1),
            hyperparameters: None,
        }
    }

    /// Hyperparameters learned by the last fit that updated them.
    #[must_use]
    pub fn hyperparameters(&self) -> Option<&GpHyperparameters> {
        self.hyperparameters.as_ref()
    }

    /// Fit and predict with explicit hyperparameters.
    fn fit_with(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        params: &GpHyperparameters,
    ) -> Result<(GpPredictor, f64)> {
        let y_vec = DVector::from_column_slice(y);
        for step in JITTER_STEPS {
            let k = kernel_matrix(
                x,
                &params.lengthscales,
                params.signal_variance,
                self.noise_variance * step,
            );
            let Some(cholesky) = nalgebra::linalg::Cholesky::new(k) else {
                continue;
            };
            let alpha = cholesky.solve(&y_vec);
            let lml = log_marginal_likelihood(&cholesky, &alpha, &y_vec);
            let predictor = GpPredictor {
                cholesky,
                alpha,
                x_train: x.to_vec(),
                params: params.clone(),
                y_mean: 0.0,
                y_std: 1.0,
            };
            return Ok((predictor, lml));
        }
        Err(Error::ModelFit("kernel matrix is not positive definite"))
    }

    /// Pick lengthscales by maximizing the log marginal likelihood over a
    /// grid of scale factors.
    fn optimize_hyperparameters(&self, x: &[Vec<f64>], y: &[f64]) -> Result<GpHyperparameters> {
        let base = base_lengthscales(x);
        let mut best: Option<(f64, GpHyperparameters)> = None;
        for scale in LENGTHSCALE_GRID {
            let candidate = GpHyperparameters {
                lengthscales: base.iter().map(|l| l * scale).collect(),
                signal_variance: 1.0,
            };
            let Ok((_, lml)) = self.fit_with(x, y, &candidate) else {
                continue;
            };
            if best.as_ref().is_none_or(|(b, _)| lml > *b) {
                best = Some((lml, candidate));
            }
        }
        best.map(|(_, params)| params)
            .ok_or(Error::ModelFit("no lengthscale candidate could be fitted"))
    }
}

impl Estimator for GpEstimator {
    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, data: &TrainingData, update_params: bool) -> Result<Box<dyn Predictor>> {
        data.check()?;
        let start = data.len().saturating_sub(self.max_train_points);
        let x = &data.x[start..];
        let y = &data.y[start..];
        let n = y.len();

        let y_mean = y.iter().sum::<f64>() / n as f64;
        let y_var = if n > 1 {
            y.iter().map(|&v| (v - y_mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            1.0
        };
        let y_std = y_var.sqrt().max(1e-10);
        let y_standardized: Vec<f64> = y.iter().map(|&v| (v - y_mean) / y_std).collect();

        let dims = x[0].len();
        let reuse = self
            .hyperparameters
            .as_ref()
            .filter(|p| !update_params && p.lengthscales.len() == dims)
            .cloned();
        let params = match reuse {
            Some(params) => params,
            None => {
                let params = self.optimize_hyperparameters(x, &y_standardized)?;
                trace_debug!(lengthscales = ?params.lengthscales, "gp hyperparameters updated");
                self.hyperparameters = Some(params.clone());
                params
            }
        };

        let (mut predictor, _) = self.fit_with(x, &y_standardized, &params)?;
        predictor.y_mean = y_mean;
        predictor.y_std = y_std;
        Ok(Box::new(predictor))
    }

    fn boxed_clone(&self) -> Box<dyn Estimator> {
        Box::new(self.clone())
    }
}

/// A fitted GP posterior.
struct GpPredictor {
    /// Cholesky factor L of K + σ²I.
    cholesky: nalgebra::linalg::Cholesky<f64, nalgebra::Dyn>,
    /// α = (K + σ²I)^{-1} y.
    alpha: DVector<f64>,
    x_train: Vec<Vec<f64>>,
    params: GpHyperparameters,
    y_mean: f64,
    y_std: f64,
}

impl Predictor for GpPredictor {
    fn predict(&self, x: &[f64]) -> Prediction {
        let k_star = kernel_vector(
            x,
            &self.x_train,
            &self.params.lengthscales,
            self.params.signal_variance,
        );

        // Mean: k*^T α
        let mean = k_star.dot(&self.alpha);

        // Variance: k(x*, x*) - k*^T (K + σ²I)^{-1} k*
        let v = self.cholesky.solve(&k_star);
        let var = (self.params.signal_variance - k_star.dot(&v)).max(0.0);

        Prediction {
            mean: self.y_mean + self.y_std * mean,
            std: self.y_std * var.sqrt(),
        }
    }

    fn num_data(&self) -> usize {
        self.x_train.len()
    }
}

/// Matérn 5/2 kernel with ARD lengthscales.
///
/// `k(x1, x2) = σ² (1 + √5 r + 5/3 r²) exp(-√5 r)`
/// where `r = sqrt(Σ ((x1_i - x2_i) / l_i)²)`
fn matern52(x1: &[f64], x2: &[f64], lengthscales: &[f64], signal_var: f64) -> f64 {
    let r_sq: f64 = x1
        .iter()
        .zip(x2)
        .zip(lengthscales)
        .map(|((a, b), l)| ((a - b) / l).powi(2))
        .sum();
    let r = r_sq.sqrt();
    let sqrt5_r = SQRT_5 * r;
    signal_var * (1.0 + sqrt5_r + 5.0 / 3.0 * r_sq) * (-sqrt5_r).exp()
}

/// Build the kernel matrix `K + σ²I`.
fn kernel_matrix(
    x: &[Vec<f64>],
    lengthscales: &[f64],
    signal_var: f64,
    noise_var: f64,
) -> DMatrix<f64> {
    let n = x.len();
    DMatrix::from_fn(n, n, |i, j| {
        let k = matern52(&x[i], &x[j], lengthscales, signal_var);
        if i == j { k + noise_var } else { k }
    })
}

/// Compute the kernel vector k(x*, X) for a test point.
fn kernel_vector(
    x_star: &[f64],
    x_train: &[Vec<f64>],
    lengthscales: &[f64],
    signal_var: f64,
) -> DVector<f64> {
    DVector::from_fn(x_train.len(), |i, _| {
        matern52(x_star, &x_train[i], lengthscales, signal_var)
    })
}

/// `log p(y | X) = -½ yᵀα - Σ log Lᵢᵢ - n/2 log 2π`
#[allow(clippy::cast_precision_loss)]
fn log_marginal_likelihood(
    cholesky: &nalgebra::linalg::Cholesky<f64, nalgebra::Dyn>,
    alpha: &DVector<f64>,
    y: &DVector<f64>,
) -> f64 {
    let n = y.len() as f64;
    let log_det_half: f64 = cholesky.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
    -0.5 * y.dot(alpha) - log_det_half - 0.5 * n * core::f64::consts::TAU.ln()
}

/// Per-dimension spread of the inputs. Dimensions with no spread get a
/// lengthscale of 1 (the width of the unit cube).
#[allow(clippy::cast_precision_loss)]
fn base_lengthscales(x: &[Vec<f64>]) -> Vec<f64> {
    let n = x.len() as f64;
    let d = x.first().map_or(0, Vec::len);
    (0..d)
        .map(|j| {
            let mean = x.iter().map(|row| row[j]).sum::<f64>() / n;
            let var = x.iter().map(|row| (row[j] - mean).powi(2)).sum::<f64>() / n;
            if var < 1e-12 { 1.0 } else { var.sqrt().max(0.05) }
        })
        .collect()
}
