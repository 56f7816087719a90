//! Answer scoring
//!
//! - [`coverage`]: reference keyword coverage
//! - [`hallucination`]: unsupported-content penalty
//! - [`composite`]: final score under a [`composite::ScoringPolicy`]
//! - [`judge`]: validation of external judge payloads
//! - [`semantic`]: embedding similarity layer

pub mod composite;
pub mod coverage;
pub mod hallucination;
pub mod judge;
pub mod semantic;

pub use composite::{
    combine, compare, legacy_final, CompositeScore, Improvement, LayerInputs, LayerWeights,
    PenaltyPreset, PenaltyWeight, ScoringPolicy,
};
pub use coverage::{CoverageOptions, CoverageScorer, SynonymScope};
pub use hallucination::{
    numeric_tokens, ExplanationPrecedence, HallucinationDetector, HallucinationMode,
    HallucinationPolicy, PenaltyBand, PenaltyTable,
};
pub use judge::{DimensionWeights, JudgeDimension, JudgePayload, JudgeScore, JudgeWarning};
pub use semantic::{cosine_similarity, similarity_score};
