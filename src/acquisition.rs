//! Acquisition criteria and the candidate search that maximizes them.
//!
//! Targets are on the internal minimization scale. For a constrained
//! searcher the criterion is constrained expected improvement:
//!
//! `CEI(x) = EI(x) · P(c(x) ≤ 0)`
//!
//! where the incumbent of `EI` is the best objective among feasible
//! observations. Before any feasible observation exists the criterion
//! degrades to the probability of feasibility alone, steering the search
//! into the feasible region first.

use std::collections::HashSet;

use crate::model::Predictor;
use crate::rng_util;
use crate::space::{Configuration, HyperparameterRanges, config_key};

/// Number of local perturbations of the incumbent added to the candidates.
const NUM_LOCAL_CANDIDATES: usize = 50;
/// Standard deviation of local perturbations in the unit cube.
const LOCAL_SIGMA: f64 = 0.1;

/// Fitted models and incumbent the acquisition function reads.
pub struct AcquisitionContext<'a> {
    /// Objective model, if it could be fitted.
    pub objective: Option<&'a dyn Predictor>,
    /// Constraint model, for constrained searchers that have constraint data.
    pub constraint: Option<&'a dyn Predictor>,
    /// Best (feasible, for constrained search) internal objective value.
    pub incumbent: Option<f64>,
    /// Encoded configuration of the incumbent.
    pub incumbent_x: Option<&'a [f64]>,
    /// Whether a constraint is part of the criterion.
    pub constrained: bool,
}

/// Score of one candidate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CandidateScore {
    /// Acquisition value (larger is better).
    pub value: f64,
    /// Predicted probability that the constraint holds.
    pub p_feasible: f64,
}

impl AcquisitionContext<'_> {
    /// Whether the models are informative enough to score candidates.
    #[must_use]
    pub fn can_score(&self) -> bool {
        if self.constrained {
            self.constraint.is_some() || (self.objective.is_some() && self.incumbent.is_some())
        } else {
            self.objective.is_some() && self.incumbent.is_some()
        }
    }

    /// Scores an encoded candidate.
    #[must_use]
    pub fn score(&self, x: &[f64]) -> CandidateScore {
        let p_feasible = if self.constrained {
            self.constraint.map_or(1.0, |model| {
                let p = model.predict(x);
                probability_feasible(p.mean, p.std)
            })
        } else {
            1.0
        };
        let value = match (self.objective, self.incumbent) {
            (Some(model), Some(f_best)) => {
                let p = model.predict(x);
                expected_improvement(p.mean, p.std, f_best) * p_feasible
            }
            _ => p_feasible,
        };
        CandidateScore { value, p_feasible }
    }
}

/// Random-candidate maximizer of the acquisition criterion.
#[derive(Clone, Debug)]
pub struct CandidateOptimizer {
    /// Number of uniformly drawn candidates.
    pub num_candidates: usize,
    /// Candidates below this predicted feasibility are dropped whenever at
    /// least one candidate clears it.
    pub min_feasibility: f64,
    /// Whether already observed, pending or failed configurations may be
    /// returned.
    pub allow_duplicates: bool,
}

impl CandidateOptimizer {
    /// Returns the best-scoring candidate, or `None` if every candidate was
    /// a duplicate.
    pub fn select(
        &self,
        ctx: &AcquisitionContext<'_>,
        ranges: &HyperparameterRanges,
        rng: &mut fastrand::Rng,
        taken: &HashSet<String>,
    ) -> Option<(Configuration, CandidateScore)> {
        let mut candidates = Vec::with_capacity(self.num_candidates + NUM_LOCAL_CANDIDATES);
        for _ in 0..self.num_candidates {
            candidates.push(ranges.random_config(rng));
        }
        if let Some(center) = ctx.incumbent_x {
            for _ in 0..NUM_LOCAL_CANDIDATES {
                let x: Vec<f64> = center
                    .iter()
                    .map(|&c| (c + LOCAL_SIGMA * rng_util::standard_normal(rng)).clamp(0.0, 1.0))
                    .collect();
                if let Ok(config) = ranges.from_ndarray(&x) {
                    candidates.push(config);
                }
            }
        }

        let mut seen = HashSet::new();
        let mut scored = Vec::with_capacity(candidates.len());
        for config in candidates {
            let key = config_key(&config);
            if !self.allow_duplicates && taken.contains(&key) {
                continue;
            }
            if !seen.insert(key) {
                continue;
            }
            let Ok(x) = ranges.to_ndarray(&config) else {
                continue;
            };
            let score = ctx.score(&x);
            scored.push((config, score));
        }

        let any_feasible = scored
            .iter()
            .any(|(_, s)| s.p_feasible >= self.min_feasibility);
        scored
            .into_iter()
            .filter(|(_, s)| !any_feasible || s.p_feasible >= self.min_feasibility)
            .fold(None, |best: Option<(Configuration, CandidateScore)>, item| match best {
                Some(b) if b.1.value >= item.1.value => Some(b),
                _ => Some(item),
            })
    }
}

/// Standard normal PDF.
#[must_use]
pub fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF (Abramowitz-Stegun rational approximation).
#[must_use]
pub fn norm_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }

    let abs_x = x.abs();
    let t = 1.0 / (1.0 + 0.231_641_9 * abs_x);
    let poly = t
        * (0.319_381_530
            + t * (-0.356_563_782 + t * (1.781_477_937 + t * (-1.821_255_978 + t * 1.330_274_429))));
    let cdf = 1.0 - norm_pdf(abs_x) * poly;

    if x >= 0.0 { cdf } else { 1.0 - cdf }
}

/// Expected improvement below `f_best` for a minimization target.
///
/// `EI(x) = (f_best - mean) Φ(z) + std φ(z)`
/// where `z = (f_best - mean) / std`
#[must_use]
pub fn expected_improvement(mean: f64, std: f64, f_best: f64) -> f64 {
    if std < 1e-12 {
        return (f_best - mean).max(0.0);
    }
    let z = (f_best - mean) / std;
    let improvement = (f_best - mean) * norm_cdf(z) + std * norm_pdf(z);
    improvement.max(0.0)
}

/// `P(c ≤ 0)` under a Gaussian predictive distribution.
#[must_use]
pub fn probability_feasible(mean: f64, std: f64) -> f64 {
    if std < 1e-12 {
        return if mean <= 0.0 { 1.0 } else { 0.0 };
    }
    norm_cdf(-mean / std)
}
