//! Composite scoring
//!
//! Blends coverage, hallucination penalty and optional external layers into
//! one final score. Two formula families exist and are kept as tagged
//! variants of [`ScoringPolicy`] so results from different formulas are never
//! compared by accident.

use crate::errors::{Result, ScoringError};
use crate::types::{CoverageResult, HallucinationResult, Layer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance for the multi-layer weight sum
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

// ============================================================================
// Policies
// ============================================================================

/// Named penalty weights for the legacy formula
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PenaltyPreset {
    /// Weight 0.5
    #[default]
    V1,
    /// Weight 0.3
    V2,
}

impl PenaltyPreset {
    pub fn weight(&self) -> f64 {
        match self {
            PenaltyPreset::V1 => 0.5,
            PenaltyPreset::V2 => 0.3,
        }
    }
}

/// Either a named preset (`"v1"`) or an explicit number (`0.4`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PenaltyWeight {
    Preset(PenaltyPreset),
    Value(f64),
}

impl Default for PenaltyWeight {
    fn default() -> Self {
        PenaltyWeight::Preset(PenaltyPreset::default())
    }
}

impl PenaltyWeight {
    pub fn value(&self) -> f64 {
        match self {
            PenaltyWeight::Preset(preset) => preset.weight(),
            PenaltyWeight::Value(w) => *w,
        }
    }
}

impl From<PenaltyPreset> for PenaltyWeight {
    fn from(preset: PenaltyPreset) -> Self {
        PenaltyWeight::Preset(preset)
    }
}

impl From<f64> for PenaltyWeight {
    fn from(w: f64) -> Self {
        PenaltyWeight::Value(w)
    }
}

/// Validated weights over the enabled layers.
///
/// Every weight is finite and strictly positive and the weights sum to 1. A
/// layer that should not contribute is left out rather than given weight 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<Layer, f64>", into = "BTreeMap<Layer, f64>")]
pub struct LayerWeights {
    weights: BTreeMap<Layer, f64>,
}

impl LayerWeights {
    pub fn new(weights: impl IntoIterator<Item = (Layer, f64)>) -> Result<Self> {
        let weights: BTreeMap<Layer, f64> = weights.into_iter().collect();
        if weights.is_empty() {
            return Err(ScoringError::configuration(
                "multi-layer scoring needs at least one layer",
            ));
        }
        for (layer, w) in &weights {
            if !w.is_finite() || *w <= 0.0 {
                return Err(ScoringError::configuration(format!(
                    "layer weight for '{}' must be finite and > 0, got {}",
                    layer, w
                )));
            }
        }
        let sum: f64 = weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ScoringError::configuration(format!(
                "layer weights must sum to 1, got {}",
                sum
            )));
        }
        Ok(Self { weights })
    }

    /// Default weights for a given set of enabled layers. Keyword coverage is
    /// always enabled.
    pub fn for_enabled(semantic: bool, judge: bool) -> Self {
        let weights: &[(Layer, f64)] = match (semantic, judge) {
            (true, true) => &[
                (Layer::KeywordCoverage, 0.3),
                (Layer::SemanticSimilarity, 0.3),
                (Layer::JudgeScore, 0.4),
            ],
            (true, false) => &[(Layer::KeywordCoverage, 0.5), (Layer::SemanticSimilarity, 0.5)],
            (false, true) => &[(Layer::KeywordCoverage, 0.4), (Layer::JudgeScore, 0.6)],
            (false, false) => &[(Layer::KeywordCoverage, 1.0)],
        };
        Self {
            weights: weights.iter().copied().collect(),
        }
    }

    pub fn get(&self, layer: Layer) -> Option<f64> {
        self.weights.get(&layer).copied()
    }

    pub fn is_enabled(&self, layer: Layer) -> bool {
        self.weights.contains_key(&layer)
    }

    /// Enabled layers with their weights, in [`Layer`] order
    pub fn iter(&self) -> impl Iterator<Item = (Layer, f64)> + '_ {
        self.weights.iter().map(|(layer, w)| (*layer, *w))
    }
}

impl Default for LayerWeights {
    fn default() -> Self {
        Self::for_enabled(true, true)
    }
}

impl TryFrom<BTreeMap<Layer, f64>> for LayerWeights {
    type Error = ScoringError;

    fn try_from(weights: BTreeMap<Layer, f64>) -> Result<Self> {
        Self::new(weights)
    }
}

impl From<LayerWeights> for BTreeMap<Layer, f64> {
    fn from(weights: LayerWeights) -> Self {
        weights.weights
    }
}

/// Which composite formula to apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// `final = coverage − penalty × penalty_weight`, unclamped
    Legacy {
        #[serde(default)]
        penalty_weight: PenaltyWeight,
    },
    /// `final = Σ weight × layer` over the enabled layers
    MultiLayer { weights: LayerWeights },
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        ScoringPolicy::legacy(PenaltyPreset::V1)
    }
}

impl ScoringPolicy {
    pub fn legacy(weight: impl Into<PenaltyWeight>) -> Self {
        ScoringPolicy::Legacy {
            penalty_weight: weight.into(),
        }
    }

    pub fn multi_layer(weights: LayerWeights) -> Self {
        ScoringPolicy::MultiLayer { weights }
    }

    /// Validate the policy.
    ///
    /// Layer weights are validated on construction; only the legacy weight
    /// can still be out of range here.
    pub fn validate(&self) -> Result<()> {
        match self {
            ScoringPolicy::Legacy { penalty_weight } => {
                let w = penalty_weight.value();
                if !w.is_finite() || w < 0.0 {
                    return Err(ScoringError::configuration(format!(
                        "penalty_weight must be finite and >= 0, got {}",
                        w
                    )));
                }
                Ok(())
            }
            ScoringPolicy::MultiLayer { .. } => Ok(()),
        }
    }
}

// ============================================================================
// Scores
// ============================================================================

/// Externally supplied layer scores on a 0–100 scale
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerInputs {
    pub semantic_similarity: Option<f64>,
    pub judge_score: Option<f64>,
}

impl LayerInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_semantic(mut self, score: f64) -> Self {
        self.semantic_similarity = Some(score);
        self
    }

    pub fn with_judge(mut self, score: f64) -> Self {
        self.judge_score = Some(score);
        self
    }
}

/// Final score for one answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub coverage_score: f64,
    pub hallucination_penalty: f64,
    pub final_score: f64,
    /// Per-layer scores; empty under the legacy policy
    pub layers: BTreeMap<Layer, f64>,
    pub policy: ScoringPolicy,
}

/// Legacy formula on raw numbers
pub fn legacy_final(coverage_score: f64, penalty: f64, penalty_weight: f64) -> f64 {
    coverage_score - penalty * penalty_weight
}

fn external_layer(layer: Layer, value: Option<f64>) -> Result<f64> {
    let value = value.ok_or_else(|| {
        ScoringError::input(format!("layer '{}' is enabled but no score was supplied", layer))
    })?;
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(ScoringError::external_payload(format!(
            "layer '{}' score must be within [0, 100], got {}",
            layer, value
        )));
    }
    Ok(value)
}

/// Combine per-answer results under `policy`.
pub fn combine(
    coverage: &CoverageResult,
    hallucination: &HallucinationResult,
    inputs: &LayerInputs,
    policy: &ScoringPolicy,
) -> Result<CompositeScore> {
    policy.validate()?;
    let coverage_score = coverage.score();
    let penalty = hallucination.penalty;

    let (final_score, layers) = match policy {
        ScoringPolicy::Legacy { penalty_weight } => (
            legacy_final(coverage_score, penalty, penalty_weight.value()),
            BTreeMap::new(),
        ),
        ScoringPolicy::MultiLayer { weights } => {
            let mut layers = BTreeMap::new();
            let mut total = 0.0;
            for (layer, w) in weights.iter() {
                let value = match layer {
                    Layer::KeywordCoverage => coverage_score,
                    Layer::SemanticSimilarity => {
                        external_layer(layer, inputs.semantic_similarity)?
                    }
                    Layer::JudgeScore => external_layer(layer, inputs.judge_score)?,
                };
                total += w * value;
                layers.insert(layer, value);
            }
            (total, layers)
        }
    };

    Ok(CompositeScore {
        coverage_score,
        hallucination_penalty: penalty,
        final_score,
        layers,
        policy: policy.clone(),
    })
}

/// Signed change from one composite score to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Improvement {
    pub coverage_delta: f64,
    pub penalty_delta: f64,
    pub final_delta: f64,
    /// Deltas for layers present in both scores
    pub layers: BTreeMap<Layer, f64>,
}

impl Improvement {
    pub fn is_regression(&self) -> bool {
        self.final_delta < 0.0
    }
}

/// `b − a` for every component; never clipped.
pub fn compare(a: &CompositeScore, b: &CompositeScore) -> Improvement {
    let layers = a
        .layers
        .iter()
        .filter_map(|(layer, before)| b.layers.get(layer).map(|after| (*layer, after - before)))
        .collect();

    Improvement {
        coverage_delta: b.coverage_score - a.coverage_score,
        penalty_delta: b.hallucination_penalty - a.hallucination_penalty,
        final_delta: b.final_score - a.final_score,
        layers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PenaltyRule;

    fn coverage(ratio: f64) -> CoverageResult {
        CoverageResult {
            matched: Vec::new(),
            missing: Vec::new(),
            synonym_hits: Vec::new(),
            ratio,
        }
    }

    fn penalty(value: f64) -> HallucinationResult {
        HallucinationResult {
            extra_ratio: 0.0,
            penalty: value,
            label: String::new(),
            rule: PenaltyRule::CoarseBand,
            answer_token_count: 0,
            extra_tokens: Vec::new(),
            extra_numeric: Vec::new(),
            explanatory_markers: Vec::new(),
            masked_numeric: 0,
        }
    }

    #[test]
    fn test_legacy_presets() {
        let inputs = LayerInputs::new();
        let v1_policy = ScoringPolicy::legacy(PenaltyPreset::V1);
        let v2_policy = ScoringPolicy::legacy(PenaltyPreset::V2);
        let v1 = combine(&coverage(0.8), &penalty(50.0), &inputs, &v1_policy).unwrap();
        let v2 = combine(&coverage(0.8), &penalty(50.0), &inputs, &v2_policy).unwrap();
        assert!((v1.final_score - 55.0).abs() < 1e-9);
        assert!((v2.final_score - 65.0).abs() < 1e-9);
        assert!(v1.layers.is_empty());
    }

    #[test]
    fn test_legacy_not_clamped() {
        let score = combine(
            &coverage(0.1),
            &penalty(100.0),
            &LayerInputs::new(),
            &ScoringPolicy::legacy(1.0),
        )
        .unwrap();
        assert!((score.final_score + 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_legacy_negative_weight_rejected() {
        let err = combine(
            &coverage(0.5),
            &penalty(0.0),
            &LayerInputs::new(),
            &ScoringPolicy::legacy(-0.1),
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_multi_layer_weighted_sum() {
        let policy = ScoringPolicy::multi_layer(LayerWeights::default());
        let inputs = LayerInputs::new().with_semantic(70.0).with_judge(90.0);
        let score = combine(&coverage(0.5), &penalty(25.0), &inputs, &policy).unwrap();

        // 0.3*50 + 0.3*70 + 0.4*90
        assert!((score.final_score - 72.0).abs() < 1e-9);
        assert_eq!(score.layers.len(), 3);
        assert_eq!(score.layers[&Layer::JudgeScore], 90.0);
        assert_eq!(score.hallucination_penalty, 25.0);
    }

    #[test]
    fn test_multi_layer_missing_input() {
        let policy = ScoringPolicy::multi_layer(LayerWeights::for_enabled(false, true));
        let err = combine(&coverage(0.5), &penalty(0.0), &LayerInputs::new(), &policy).unwrap_err();
        assert!(err.is_input());
    }

    #[test]
    fn test_multi_layer_out_of_range_input() {
        let policy = ScoringPolicy::multi_layer(LayerWeights::for_enabled(true, false));
        let inputs = LayerInputs::new().with_semantic(120.0);
        let err = combine(&coverage(0.5), &penalty(0.0), &inputs, &policy).unwrap_err();
        assert!(err.is_external_payload());
    }

    #[test]
    fn test_layer_weight_validation() {
        use Layer::{JudgeScore, KeywordCoverage};
        assert!(LayerWeights::new([(KeywordCoverage, 0.5), (JudgeScore, 0.4)]).is_err());
        assert!(LayerWeights::new([(KeywordCoverage, 1.0), (JudgeScore, 0.0)]).is_err());
        assert!(LayerWeights::new([(KeywordCoverage, f64::NAN)]).is_err());
        assert!(LayerWeights::new(Vec::new()).is_err());
        assert!(LayerWeights::new([(KeywordCoverage, 0.4), (JudgeScore, 0.6)]).is_ok());
    }

    #[test]
    fn test_preset_weights_are_valid() {
        for semantic in [false, true] {
            for judge in [false, true] {
                let preset = LayerWeights::for_enabled(semantic, judge);
                assert!(LayerWeights::new(preset.iter()).is_ok());
                assert_eq!(preset.is_enabled(Layer::SemanticSimilarity), semantic);
                assert_eq!(preset.is_enabled(Layer::JudgeScore), judge);
            }
        }
    }

    #[test]
    fn test_policy_serde() {
        let policy: ScoringPolicy =
            serde_json::from_str(r#"{"policy":"legacy","penalty_weight":"v2"}"#).unwrap();
        assert_eq!(policy, ScoringPolicy::legacy(PenaltyPreset::V2));

        let policy: ScoringPolicy =
            serde_json::from_str(r#"{"policy":"legacy","penalty_weight":0.4}"#).unwrap();
        assert_eq!(policy, ScoringPolicy::legacy(0.4));

        let policy: ScoringPolicy = serde_json::from_str(
            r#"{"policy":"multi_layer","weights":{"keyword":0.5,"semantic":0.5}}"#,
        )
        .unwrap();
        assert_eq!(policy, ScoringPolicy::multi_layer(LayerWeights::for_enabled(true, false)));

        let bad = serde_json::from_str::<ScoringPolicy>(
            r#"{"policy":"multi_layer","weights":{"keyword":0.5,"semantic":0.6}}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_compare_is_signed() {
        let policy = ScoringPolicy::multi_layer(LayerWeights::for_enabled(true, false));
        let before = LayerInputs::new().with_semantic(60.0);
        let after = LayerInputs::new().with_semantic(70.0);
        let a = combine(&coverage(0.8), &penalty(0.0), &before, &policy).unwrap();
        let b = combine(&coverage(0.4), &penalty(50.0), &after, &policy).unwrap();

        let delta = compare(&a, &b);
        assert!((delta.coverage_delta + 40.0).abs() < 1e-9);
        assert_eq!(delta.penalty_delta, 50.0);
        assert!((delta.final_delta + 15.0).abs() < 1e-9);
        assert_eq!(delta.layers[&Layer::SemanticSimilarity], 10.0);
        assert!(delta.is_regression());
    }
}
