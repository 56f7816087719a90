//! # rag_scorecard
//!
//! Scoring engine for answers produced by retrieval-augmented pipelines.
//!
//! Given the expected vocabulary for a question and one or more candidate
//! answers, the crate measures how much of the vocabulary each answer
//! covers, flags content the reference cannot account for, blends those
//! signals (optionally with semantic-similarity and LLM-judge layers) into a
//! comparable final score, and calibrates the hallucination penalty weight
//! against human judgments.
//!
//! ## Features
//!
//! - **Deterministic**: identical inputs give bit-identical results, with or
//!   without parallelism
//! - **Unicode-aware**: CJK runs, full-width characters and protected domain
//!   phrases are handled explicitly
//! - **Configurable**: every threshold is data, loadable from JSON
//!
//! ## Example
//!
//! ```rust
//! use rag_scorecard::{CoverageScorer, KeywordExtractor, ProtectedTermSet};
//!
//! let extractor = KeywordExtractor::new(ProtectedTermSet::work_permit());
//! let vocabulary = extractor.extract("工作許可證、申請流程、包商名稱");
//!
//! let coverage = CoverageScorer::new()
//!     .score(&vocabulary, "需要先取得工作許可證才能動工")
//!     .unwrap();
//! assert_eq!(coverage.matched, ["工作許可證"]);
//! ```

pub mod config;
pub mod errors;
pub mod evaluator;
pub mod keywords;
pub mod nlp;
pub mod optimizer;
pub mod scoring;
pub mod summary;
pub mod types;

// Re-export commonly used types
pub use config::{EvaluationConfig, RuntimeOptions};
pub use errors::{Result, ScoringError};
pub use types::{
    CoverageResult, HallucinationResult, Layer, PenaltyRule, ReferenceVocabulary, SynonymHit,
};

// Re-export main functionality
pub use evaluator::{
    Evaluator, QuestionEvaluation, QuestionRecord, VariantAnswer, VariantComparison,
    VariantEvaluation,
};
pub use keywords::KeywordExtractor;
pub use nlp::terms::{ProtectedTermSet, SynonymGroups};
pub use nlp::tokenizer::{Segmenter, Tokenizer};
pub use optimizer::{SweepReport, SweepSample, WeightCandidates, WeightOptimizer, WeightSample};
pub use scoring::{
    combine, compare, CompositeScore, CoverageOptions, CoverageScorer, HallucinationDetector,
    HallucinationMode, HallucinationPolicy, Improvement, JudgeScore, LayerInputs, LayerWeights,
    PenaltyPreset, ScoringPolicy,
};
pub use summary::{summarize, EvaluationSummary, SummaryThresholds};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
