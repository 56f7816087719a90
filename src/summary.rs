//! Summary statistics over a batch of evaluated questions

use crate::errors::{Result, ScoringError};
use crate::evaluator::QuestionEvaluation;
use crate::types::Layer;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cut-offs used when counting notable results
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryThresholds {
    /// Final scores at or above this count as high
    pub high_score: f64,
    /// Final-score gains at or above this count as significant
    pub significant_improvement: f64,
    /// Coverage scores at or above this count as high
    pub high_coverage: f64,
    /// Hallucination penalties at or below this count as faithful
    pub high_faithfulness_penalty: f64,
}

impl Default for SummaryThresholds {
    fn default() -> Self {
        Self {
            high_score: 80.0,
            significant_improvement: 10.0,
            high_coverage: 80.0,
            high_faithfulness_penalty: 10.0,
        }
    }
}

impl SummaryThresholds {
    pub fn validate(&self) -> Result<()> {
        let values = [
            self.high_score,
            self.significant_improvement,
            self.high_coverage,
            self.high_faithfulness_penalty,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ScoringError::configuration("summary thresholds must be finite"));
        }
        Ok(())
    }
}

/// Aggregates for one answer variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSummary {
    pub variant: String,
    pub count: usize,
    pub mean_coverage: f64,
    pub mean_penalty: f64,
    pub mean_final: f64,
    /// Mean of each layer over the answers that reported it
    pub mean_layers: BTreeMap<Layer, f64>,
    /// Share of answers with a final score ≥ `high_score`
    pub high_score_ratio: f64,
    /// Share of answers with no hallucination penalty at all
    pub zero_penalty_ratio: f64,
    /// Share of answers with a coverage score ≥ `high_coverage`
    pub high_coverage_ratio: f64,
    /// Share of answers with a penalty ≤ `high_faithfulness_penalty`
    pub high_faithfulness_ratio: f64,
    /// Answers whose hallucination result was flagged for review
    pub needs_review: usize,
}

/// Aggregates for one variant compared against the baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementSummary {
    pub baseline: String,
    pub variant: String,
    pub count: usize,
    pub mean_coverage_delta: f64,
    pub mean_penalty_delta: f64,
    pub mean_final_delta: f64,
    /// Mean delta of each layer over the comparisons that reported it
    pub mean_layer_deltas: BTreeMap<Layer, f64>,
    /// Share of questions whose final delta ≥ `significant_improvement`
    pub significant_ratio: f64,
    /// Share of questions whose final delta < 0
    pub regression_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub questions: usize,
    /// In first-seen order
    pub variants: Vec<VariantSummary>,
    pub improvements: Vec<ImprovementSummary>,
}

#[derive(Default)]
struct VariantAccumulator {
    count: usize,
    coverage: f64,
    penalty: f64,
    final_score: f64,
    layers: BTreeMap<Layer, (f64, usize)>,
    high: usize,
    zero_penalty: usize,
    high_coverage: usize,
    faithful: usize,
    review: usize,
}

#[derive(Default)]
struct ImprovementAccumulator {
    count: usize,
    coverage: f64,
    penalty: f64,
    final_score: f64,
    layers: BTreeMap<Layer, (f64, usize)>,
    significant: usize,
    regressions: usize,
}

/// Index of `key` in `order`, inserting it when new
fn slot<'a>(
    order: &mut Vec<&'a str>,
    index: &mut FxHashMap<&'a str, usize>,
    key: &'a str,
) -> usize {
    *index.entry(key).or_insert_with(|| {
        order.push(key);
        order.len() - 1
    })
}

/// Add `values` into per-layer running sums
fn accumulate_layers(sums: &mut BTreeMap<Layer, (f64, usize)>, values: &BTreeMap<Layer, f64>) {
    for (layer, value) in values {
        let entry = sums.entry(*layer).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
}

fn layer_means(sums: BTreeMap<Layer, (f64, usize)>) -> BTreeMap<Layer, f64> {
    sums.into_iter()
        .map(|(layer, (sum, count))| (layer, sum / count as f64))
        .collect()
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Summarize per-variant means and baseline comparisons.
///
/// Sums run in input order, so the result does not depend on how the
/// evaluations were produced.
pub fn summarize(
    evaluations: &[QuestionEvaluation],
    thresholds: &SummaryThresholds,
) -> EvaluationSummary {
    let mut variant_order = Vec::new();
    let mut variant_index = FxHashMap::default();
    let mut variants: Vec<VariantAccumulator> = Vec::new();

    let mut pair_order: Vec<(&str, &str)> = Vec::new();
    let mut pair_index: FxHashMap<(&str, &str), usize> = FxHashMap::default();
    let mut pairs: Vec<ImprovementAccumulator> = Vec::new();

    for evaluation in evaluations {
        for v in &evaluation.variants {
            let idx = slot(&mut variant_order, &mut variant_index, &v.variant);
            if idx == variants.len() {
                variants.push(VariantAccumulator::default());
            }
            let acc = &mut variants[idx];
            acc.count += 1;
            acc.coverage += v.composite.coverage_score;
            acc.penalty += v.composite.hallucination_penalty;
            acc.final_score += v.composite.final_score;
            accumulate_layers(&mut acc.layers, &v.composite.layers);
            if v.composite.final_score >= thresholds.high_score {
                acc.high += 1;
            }
            if v.composite.hallucination_penalty == 0.0 {
                acc.zero_penalty += 1;
            }
            if v.composite.coverage_score >= thresholds.high_coverage {
                acc.high_coverage += 1;
            }
            if v.composite.hallucination_penalty <= thresholds.high_faithfulness_penalty {
                acc.faithful += 1;
            }
            if v.hallucination.needs_review() {
                acc.review += 1;
            }
        }

        for c in &evaluation.comparisons {
            let key = (c.baseline.as_str(), c.variant.as_str());
            let idx = *pair_index.entry(key).or_insert_with(|| {
                pair_order.push(key);
                pairs.push(ImprovementAccumulator::default());
                pairs.len() - 1
            });
            let acc = &mut pairs[idx];
            acc.count += 1;
            acc.coverage += c.improvement.coverage_delta;
            acc.penalty += c.improvement.penalty_delta;
            acc.final_score += c.improvement.final_delta;
            accumulate_layers(&mut acc.layers, &c.improvement.layers);
            if c.improvement.final_delta >= thresholds.significant_improvement {
                acc.significant += 1;
            }
            if c.improvement.is_regression() {
                acc.regressions += 1;
            }
        }
    }

    let variants = variant_order
        .into_iter()
        .zip(variants)
        .map(|(name, acc)| {
            let n = acc.count as f64;
            VariantSummary {
                variant: name.to_string(),
                count: acc.count,
                mean_coverage: acc.coverage / n,
                mean_penalty: acc.penalty / n,
                mean_final: acc.final_score / n,
                mean_layers: layer_means(acc.layers),
                high_score_ratio: ratio(acc.high, acc.count),
                zero_penalty_ratio: ratio(acc.zero_penalty, acc.count),
                high_coverage_ratio: ratio(acc.high_coverage, acc.count),
                high_faithfulness_ratio: ratio(acc.faithful, acc.count),
                needs_review: acc.review,
            }
        })
        .collect();

    let improvements = pair_order
        .into_iter()
        .zip(pairs)
        .map(|((baseline, variant), acc)| {
            let n = acc.count as f64;
            ImprovementSummary {
                baseline: baseline.to_string(),
                variant: variant.to_string(),
                count: acc.count,
                mean_coverage_delta: acc.coverage / n,
                mean_penalty_delta: acc.penalty / n,
                mean_final_delta: acc.final_score / n,
                mean_layer_deltas: layer_means(acc.layers),
                significant_ratio: ratio(acc.significant, acc.count),
                regression_ratio: ratio(acc.regressions, acc.count),
            }
        })
        .collect();

    EvaluationSummary {
        questions: evaluations.len(),
        variants,
        improvements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluationConfig;
    use crate::evaluator::{Evaluator, QuestionRecord, VariantAnswer};
    use crate::scoring::{LayerWeights, ScoringPolicy};

    fn record(id: &str, vocabulary: &str, baseline: &str, improved: &str) -> QuestionRecord {
        QuestionRecord {
            id: id.to_string(),
            question: None,
            expected_vocabulary: Some(vocabulary.to_string()),
            answers: vec![
                VariantAnswer::text("baseline", baseline),
                VariantAnswer::text("improved", improved),
            ],
        }
    }

    #[test]
    fn test_empty_batch() {
        let summary = summarize(&[], &SummaryThresholds::default());
        assert_eq!(summary.questions, 0);
        assert!(summary.variants.is_empty());
        assert!(summary.improvements.is_empty());
    }

    #[test]
    fn test_variant_means_and_ratios() {
        let evaluator = Evaluator::new(EvaluationConfig::default()).unwrap();
        let evaluations = vec![
            evaluator
                .evaluate(&record(
                    "q1",
                    "permit contractor",
                    "nothing relevant",
                    "permit contractor",
                ))
                .unwrap(),
            evaluator
                .evaluate(&record("q2", "welding cutting", "welding cutting", "welding cutting"))
                .unwrap(),
        ];

        let summary = summarize(&evaluations, &SummaryThresholds::default());
        assert_eq!(summary.questions, 2);
        assert_eq!(summary.variants.len(), 2);
        assert_eq!(summary.variants[0].variant, "baseline");
        assert_eq!(summary.variants[1].variant, "improved");

        // improved: both answers fully covered and grounded
        let improved = &summary.variants[1];
        assert_eq!(improved.count, 2);
        assert!((improved.mean_final - 100.0).abs() < 1e-9);
        assert_eq!(improved.high_score_ratio, 1.0);
        assert_eq!(improved.zero_penalty_ratio, 1.0);
        assert_eq!(improved.high_coverage_ratio, 1.0);
        assert_eq!(improved.high_faithfulness_ratio, 1.0);

        // baseline: q1 scores 0 − 100×0.5, q2 scores 100
        let baseline = &summary.variants[0];
        assert!((baseline.mean_final - 25.0).abs() < 1e-9);
        assert_eq!(baseline.high_score_ratio, 0.5);
        assert_eq!(baseline.zero_penalty_ratio, 0.5);
        assert_eq!(baseline.high_coverage_ratio, 0.5);
        assert_eq!(baseline.high_faithfulness_ratio, 0.5);

        let improvement = &summary.improvements[0];
        assert_eq!(improvement.baseline, "baseline");
        assert_eq!(improvement.variant, "improved");
        assert_eq!(improvement.count, 2);
        assert_eq!(improvement.significant_ratio, 0.5);
        assert_eq!(improvement.regression_ratio, 0.0);
        assert!((improvement.mean_final_delta - 75.0).abs() < 1e-9);
        // legacy scoring reports no layers
        assert!(improvement.mean_layer_deltas.is_empty());
    }

    #[test]
    fn test_layer_deltas_under_multi_layer() {
        let config = EvaluationConfig::default().with_scoring(ScoringPolicy::multi_layer(
            LayerWeights::for_enabled(true, false),
        ));
        let evaluator = Evaluator::new(config).unwrap();
        let scored = |id: &str, vocabulary: &str, before: f64, after: f64| QuestionRecord {
            id: id.to_string(),
            question: None,
            expected_vocabulary: Some(vocabulary.to_string()),
            answers: vec![
                VariantAnswer::text("baseline", vocabulary).with_semantic_similarity(before),
                VariantAnswer::text("improved", vocabulary).with_semantic_similarity(after),
            ],
        };
        let evaluations = vec![
            evaluator.evaluate(&scored("q1", "permit contractor", 40.0, 80.0)).unwrap(),
            evaluator.evaluate(&scored("q2", "welding cutting", 60.0, 70.0)).unwrap(),
        ];

        let summary = summarize(&evaluations, &SummaryThresholds::default());
        let baseline = &summary.variants[0];
        assert!((baseline.mean_layers[&Layer::SemanticSimilarity] - 50.0).abs() < 1e-9);

        let deltas = &summary.improvements[0].mean_layer_deltas;
        assert_eq!(deltas.len(), 2);
        assert!((deltas[&Layer::SemanticSimilarity] - 25.0).abs() < 1e-9);
        assert!(deltas[&Layer::KeywordCoverage].abs() < 1e-9);
        // final = 0.5 × coverage + 0.5 × semantic
        assert!((summary.improvements[0].mean_final_delta - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_thresholds_reject_non_finite() {
        let thresholds = SummaryThresholds {
            high_coverage: f64::NAN,
            ..SummaryThresholds::default()
        };
        assert!(thresholds.validate().unwrap_err().is_configuration());
        assert!(SummaryThresholds::default().validate().is_ok());
    }
}
