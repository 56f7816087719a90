//! Per-question evaluation
//!
//! An [`Evaluator`] is built once from an [`EvaluationConfig`] and scores
//! [`QuestionRecord`]s: the expected vocabulary is extracted, every answer
//! variant is scored for coverage, hallucination and composite score, and
//! each variant is compared against the first one (the baseline).
//!
//! Evaluation of one question is a pure function of the record and the
//! config, so [`Evaluator::evaluate_batch`] can fan out across questions
//! without changing any result.

use crate::config::EvaluationConfig;
use crate::errors::{Result, ScoringError};
use crate::keywords::extraction::KeywordExtractor;
use crate::nlp::tokenizer::Tokenizer;
use crate::scoring::composite::{combine, compare, CompositeScore, Improvement, LayerInputs};
use crate::scoring::coverage::CoverageScorer;
use crate::scoring::hallucination::HallucinationDetector;
use crate::scoring::judge::{JudgeScore, JudgeWarning};
use crate::types::{CoverageResult, HallucinationResult, ReferenceVocabulary};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Enter a tracing span for an evaluation stage (when the `tracing` feature
/// is enabled). When disabled, this is a no-op.
macro_rules! trace_stage {
    ($name:expr) => {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("evaluation_stage", stage = $name).entered();
    };
}

const STAGE_EXTRACT: &str = "extract";
const STAGE_SCORE: &str = "score";
const STAGE_COMPARE: &str = "compare";

// ============================================================================
// Input records
// ============================================================================

/// One candidate answer produced by a pipeline variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantAnswer {
    /// Variant name, e.g. `"original"` or `"optimized"`
    pub variant: String,
    #[serde(default)]
    pub text: Option<String>,
    /// Semantic similarity on a 0–100 scale, when available
    #[serde(default)]
    pub semantic_similarity: Option<f64>,
    /// Raw judge payload, validated during evaluation
    #[serde(default)]
    pub judge: Option<serde_json::Value>,
}

impl VariantAnswer {
    /// An answer with text only
    pub fn text(variant: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            variant: variant.into(),
            text: Some(text.into()),
            semantic_similarity: None,
            judge: None,
        }
    }

    pub fn with_semantic_similarity(mut self, score: f64) -> Self {
        self.semantic_similarity = Some(score);
        self
    }

    pub fn with_judge(mut self, payload: serde_json::Value) -> Self {
        self.judge = Some(payload);
        self
    }
}

/// One row of the evaluation sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: String,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub expected_vocabulary: Option<String>,
    pub answers: Vec<VariantAnswer>,
}

// ============================================================================
// Results
// ============================================================================

/// Scores for one answer variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantEvaluation {
    pub variant: String,
    pub coverage: CoverageResult,
    pub hallucination: HallucinationResult,
    pub composite: CompositeScore,
    /// Parsed judge score, when a payload was supplied
    pub judge: Option<JudgeScore>,
    pub judge_warnings: Vec<JudgeWarning>,
}

/// A variant measured against the baseline variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantComparison {
    pub baseline: String,
    pub variant: String,
    pub improvement: Improvement,
}

/// All results for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionEvaluation {
    pub id: String,
    pub question: Option<String>,
    pub vocabulary: ReferenceVocabulary,
    /// In input order; the first is the baseline
    pub variants: Vec<VariantEvaluation>,
    pub comparisons: Vec<VariantComparison>,
}

impl QuestionEvaluation {
    pub fn variant(&self, name: &str) -> Option<&VariantEvaluation> {
        self.variants.iter().find(|v| v.variant == name)
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Scores question records under one configuration
#[derive(Debug, Clone)]
pub struct Evaluator {
    config: EvaluationConfig,
    extractor: KeywordExtractor<Tokenizer>,
    coverage: CoverageScorer,
    detector: HallucinationDetector<Tokenizer>,
}

impl Evaluator {
    /// Validate `config` and build the scorers it describes
    pub fn new(config: EvaluationConfig) -> Result<Self> {
        config.validate()?;

        let tokenizer = Tokenizer::new().with_lexicon(config.lexicon.iter().cloned());
        let extractor =
            KeywordExtractor::with_segmenter(config.protected_terms.clone(), tokenizer.clone());
        let mut coverage = CoverageScorer::new().with_options(config.coverage);
        if let Some(synonyms) = &config.synonyms {
            coverage = coverage.with_synonyms(synonyms.clone());
        }
        let detector = HallucinationDetector::with_segmenter(
            config.hallucination.clone(),
            config.protected_terms.clone(),
            tokenizer,
        );

        Ok(Self {
            config,
            extractor,
            coverage,
            detector,
        })
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Extract the reference vocabulary for `reference_text`
    pub fn vocabulary(&self, reference_text: &str) -> ReferenceVocabulary {
        self.extractor.extract(reference_text)
    }

    /// Score one answer against an already extracted vocabulary
    pub fn evaluate_variant(
        &self,
        vocabulary: &ReferenceVocabulary,
        answer: &VariantAnswer,
    ) -> Result<VariantEvaluation> {
        let text = answer.text.as_deref().ok_or_else(|| {
            ScoringError::input(format!("variant '{}' has no answer text", answer.variant))
        })?;

        let coverage = self.coverage.score(vocabulary, text)?;
        let hallucination = self
            .detector
            .detect(vocabulary, text, self.config.hallucination_mode);

        let (judge, judge_warnings) = match &answer.judge {
            Some(value) => {
                let payload = JudgeScore::from_value(value)?;
                (Some(payload.score), payload.warnings)
            }
            None => (None, Vec::new()),
        };
        let judge_score = judge.as_ref().map(|j| match &self.config.judge_dimensions {
            Some(weights) => j.overall_with(weights),
            None => j.overall,
        });

        let inputs = LayerInputs {
            semantic_similarity: answer.semantic_similarity,
            judge_score,
        };
        let composite = combine(&coverage, &hallucination, &inputs, &self.config.scoring)?;

        Ok(VariantEvaluation {
            variant: answer.variant.clone(),
            coverage,
            hallucination,
            composite,
            judge,
            judge_warnings,
        })
    }

    /// Score every answer of `record` and compare each with the first.
    pub fn evaluate(&self, record: &QuestionRecord) -> Result<QuestionEvaluation> {
        let reference = record.expected_vocabulary.as_deref().ok_or_else(|| {
            ScoringError::input(format!("question '{}' has no expected vocabulary", record.id))
        })?;
        if record.answers.is_empty() {
            return Err(ScoringError::input(format!(
                "question '{}' has no answers",
                record.id
            )));
        }
        let mut names = FxHashSet::default();
        if let Some(dup) = record.answers.iter().find(|a| !names.insert(a.variant.as_str())) {
            return Err(ScoringError::input(format!(
                "question '{}' has duplicate variant '{}'",
                record.id, dup.variant
            )));
        }

        let vocabulary = {
            trace_stage!(STAGE_EXTRACT);
            self.extractor.extract(reference)
        };

        let variants = {
            trace_stage!(STAGE_SCORE);
            record
                .answers
                .iter()
                .map(|answer| self.evaluate_variant(&vocabulary, answer))
                .collect::<Result<Vec<_>>>()?
        };

        let comparisons = {
            trace_stage!(STAGE_COMPARE);
            match variants.split_first() {
                Some((baseline, rest)) => rest
                    .iter()
                    .map(|v| VariantComparison {
                        baseline: baseline.variant.clone(),
                        variant: v.variant.clone(),
                        improvement: compare(&baseline.composite, &v.composite),
                    })
                    .collect(),
                None => Vec::new(),
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            question = %record.id,
            vocabulary = vocabulary.len(),
            variants = variants.len(),
            "question evaluated"
        );

        Ok(QuestionEvaluation {
            id: record.id.clone(),
            question: record.question.clone(),
            vocabulary,
            variants,
            comparisons,
        })
    }

    /// Evaluate many records, one result per record in input order.
    ///
    /// The outer error covers runtime setup only; per-question failures are
    /// returned in place so the caller decides whether to skip or abort.
    pub fn evaluate_batch(
        &self,
        records: &[QuestionRecord],
    ) -> Result<Vec<Result<QuestionEvaluation>>> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("evaluate_batch", questions = records.len()).entered();

        let runtime = &self.config.runtime;
        if runtime.parallel {
            runtime.scoped(|| records.par_iter().map(|r| self.evaluate(r)).collect())
        } else {
            Ok(records.iter().map(|r| self.evaluate(r)).collect())
        }
    }
}
