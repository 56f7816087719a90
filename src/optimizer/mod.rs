//! Penalty-weight calibration
//!
//! Sweeps candidate penalty weights for the legacy formula
//! `composite = coverage − penalty × w` and picks the weight whose
//! composite scores agree best with human judgments.
//!
//! Ranking is lexicographic: higher Spearman, then higher Pearson, then
//! lower MSE, then the smaller weight. A candidate whose composite scores
//! have zero variance has no defined correlation and ranks below every
//! defined one.

pub mod stats;

use crate::config::RuntimeOptions;
use crate::errors::{Result, ScoringError};
use crate::scoring::composite::legacy_final;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Scores closer than this are treated as equal when ranking candidates
const SCORE_EPSILON: f64 = 1e-10;

/// Rounding applied to generated candidate grids
const GRID_DECIMALS: f64 = 1e12;

/// Upper bound on the size of a generated candidate grid
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// One calibration sample: automated scores plus the human score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightSample {
    pub coverage_score: f64,
    pub hallucination_penalty: f64,
    pub human_score: f64,
}

impl WeightSample {
    pub fn new(coverage_score: f64, hallucination_penalty: f64, human_score: f64) -> Self {
        Self {
            coverage_score,
            hallucination_penalty,
            human_score,
        }
    }

    fn is_finite(&self) -> bool {
        self.coverage_score.is_finite()
            && self.hallucination_penalty.is_finite()
            && self.human_score.is_finite()
    }
}

/// Validated, non-empty list of candidate weights (finite, ≥ 0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct WeightCandidates {
    weights: Vec<f64>,
}

impl WeightCandidates {
    pub fn new(weights: Vec<f64>) -> Result<Self> {
        if weights.is_empty() {
            return Err(ScoringError::configuration("candidate weight list is empty"));
        }
        if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(ScoringError::configuration(format!(
                "candidate weights must be finite and >= 0, got {}",
                bad
            )));
        }
        Ok(Self { weights })
    }

    /// `start, start + step, …` up to and including `end`.
    ///
    /// Each value is computed as `start + index × step` and rounded, so
    /// `range(0.1, 1.0, 0.1)` yields exactly ten clean values.
    pub fn range(start: f64, end: f64, step: f64) -> Result<Self> {
        let finite = start.is_finite() && end.is_finite() && step.is_finite();
        if !finite || step <= 0.0 || end < start {
            return Err(ScoringError::configuration(format!(
                "invalid candidate range: start={}, end={}, step={}",
                start, end, step
            )));
        }
        let steps = ((end - start) / step + 1e-9).floor();
        if !steps.is_finite() || steps >= MAX_GRID_POINTS as f64 {
            return Err(ScoringError::configuration(format!(
                "candidate range would produce more than {} weights (start={}, end={}, step={})",
                MAX_GRID_POINTS, start, end, step
            )));
        }
        let steps = steps as usize;
        let weights = (0..=steps)
            .map(|i| ((start + i as f64 * step) * GRID_DECIMALS).round() / GRID_DECIMALS)
            .collect();
        Self::new(weights)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl TryFrom<Vec<f64>> for WeightCandidates {
    type Error = ScoringError;

    fn try_from(weights: Vec<f64>) -> Result<Self> {
        Self::new(weights)
    }
}

impl From<WeightCandidates> for Vec<f64> {
    fn from(candidates: WeightCandidates) -> Self {
        candidates.weights
    }
}

/// Metrics for one candidate weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSample {
    pub weight: f64,
    /// Composite score per calibration sample, in sample order
    pub composite_scores: Vec<f64>,
    /// `None` when undefined (zero-variance composite scores)
    pub pearson: Option<f64>,
    pub spearman: Option<f64>,
    pub mse: f64,
}

/// Defined values first, higher first
fn cmp_correlation(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) if (x - y).abs() <= SCORE_EPSILON => Ordering::Equal,
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl SweepSample {
    pub fn is_defined(&self) -> bool {
        self.spearman.is_some() && self.pearson.is_some()
    }

    /// Deterministic ranking order; `Less` means `self` is the better
    /// candidate.
    pub fn stable_cmp(&self, other: &Self) -> Ordering {
        cmp_correlation(self.spearman, other.spearman)
            .then_with(|| cmp_correlation(self.pearson, other.pearson))
            .then_with(|| {
                if (self.mse - other.mse).abs() <= SCORE_EPSILON {
                    Ordering::Equal
                } else {
                    self.mse.total_cmp(&other.mse)
                }
            })
            .then_with(|| self.weight.total_cmp(&other.weight))
    }
}

/// Full sweep table plus the recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// One entry per candidate, in candidate order
    pub samples: Vec<SweepSample>,
    pub recommended_weight: f64,
    /// Index of the recommended entry in `samples`
    pub recommended_index: usize,
}

impl SweepReport {
    pub fn recommended(&self) -> &SweepSample {
        &self.samples[self.recommended_index]
    }
}

/// Sweeps penalty weights against human scores
#[derive(Debug, Clone, Default)]
pub struct WeightOptimizer {
    runtime: RuntimeOptions,
}

impl WeightOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runtime(runtime: RuntimeOptions) -> Self {
        Self { runtime }
    }

    fn evaluate_candidate(samples: &[WeightSample], human: &[f64], weight: f64) -> SweepSample {
        let composite_scores: Vec<f64> = samples
            .iter()
            .map(|s| legacy_final(s.coverage_score, s.hallucination_penalty, weight))
            .collect();
        let pearson = stats::pearson(&composite_scores, human);
        let spearman = stats::spearman(&composite_scores, human);
        // Lengths match and are ≥ 2, checked by the caller
        let mse = stats::mean_squared_error(&composite_scores, human).unwrap_or(f64::NAN);
        SweepSample {
            weight,
            composite_scores,
            pearson,
            spearman,
            mse,
        }
    }

    /// Evaluate every candidate and recommend one.
    pub fn optimize(
        &self,
        samples: &[WeightSample],
        candidates: &WeightCandidates,
    ) -> Result<SweepReport> {
        if samples.len() < 2 {
            return Err(ScoringError::statistical_undefined(format!(
                "weight calibration needs at least 2 samples, got {}",
                samples.len()
            )));
        }
        if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
            return Err(ScoringError::input(format!(
                "calibration sample {} contains a non-finite value",
                pos
            )));
        }
        let human: Vec<f64> = samples.iter().map(|s| s.human_score).collect();
        if stats::variance(&human).is_some_and(|v| v == 0.0) {
            return Err(ScoringError::statistical_undefined(
                "human scores have zero variance",
            ));
        }

        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "weight_sweep",
            samples = samples.len(),
            candidates = candidates.len()
        )
        .entered();

        let weights = candidates.as_slice();
        let sweep: Vec<SweepSample> = if self.runtime.parallel {
            self.runtime.scoped(|| {
                weights
                    .par_iter()
                    .map(|&w| Self::evaluate_candidate(samples, &human, w))
                    .collect()
            })?
        } else {
            weights
                .iter()
                .map(|&w| Self::evaluate_candidate(samples, &human, w))
                .collect()
        };

        let undefined = sweep.iter().filter(|s| !s.is_defined()).count();
        if undefined == sweep.len() {
            return Err(ScoringError::statistical_undefined(
                "correlation is undefined for every candidate weight",
            ));
        }
        if undefined > 0 {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                undefined,
                "some candidate weights have undefined correlation and rank last"
            );
        }

        let recommended_index = sweep
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.stable_cmp(b))
            .map(|(idx, _)| idx)
            .ok_or_else(|| ScoringError::configuration("candidate weight list is empty"))?;
        let recommended_weight = sweep[recommended_index].weight;

        #[cfg(feature = "tracing")]
        tracing::debug!(recommended_weight, "weight sweep complete");

        Ok(SweepReport {
            samples: sweep,
            recommended_weight,
            recommended_index,
        })
    }
}
