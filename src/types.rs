//! Core types for rag_scorecard
//!
//! This module defines the records that flow between the scorers: the
//! reference vocabulary, coverage and hallucination results, and the
//! layer identifiers used by composite scoring.

use serde::{Deserialize, Serialize};

// ============================================================================
// Reference Vocabulary
// ============================================================================

/// Ordered, deduplicated set of keyword tokens for one question.
///
/// Insertion order is preserved; it determines the order of matched and
/// missing tokens in every downstream report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ReferenceVocabulary {
    tokens: Vec<String>,
}

impl ReferenceVocabulary {
    /// Create an empty vocabulary
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a vocabulary from tokens, dropping blanks and duplicates
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Self::new();
        for token in tokens {
            vocab.push(token);
        }
        vocab
    }

    /// Append a token; returns `false` if it was blank or already present
    pub fn push(&mut self, token: impl Into<String>) -> bool {
        let token = token.into();
        if token.trim().is_empty() || self.contains(&token) {
            return false;
        }
        self.tokens.push(token);
        true
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl From<Vec<String>> for ReferenceVocabulary {
    fn from(tokens: Vec<String>) -> Self {
        Self::from_tokens(tokens)
    }
}

impl From<ReferenceVocabulary> for Vec<String> {
    fn from(vocab: ReferenceVocabulary) -> Self {
        vocab.tokens
    }
}

// ============================================================================
// Coverage
// ============================================================================

/// A keyword that matched only through one of its synonyms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymHit {
    pub keyword: String,
    pub variant: String,
}

/// Outcome of matching a vocabulary against one answer.
///
/// `matched` and `missing` partition the vocabulary, each in vocabulary
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageResult {
    pub matched: Vec<String>,
    pub missing: Vec<String>,
    /// Subset of `matched` that only matched via a synonym
    pub synonym_hits: Vec<SynonymHit>,
    /// |matched| / |vocabulary|, or 1.0 for an empty vocabulary
    pub ratio: f64,
}

impl CoverageResult {
    /// Result for an empty vocabulary: nothing to miss.
    pub fn vacuous() -> Self {
        Self {
            matched: Vec::new(),
            missing: Vec::new(),
            synonym_hits: Vec::new(),
            ratio: 1.0,
        }
    }

    /// Coverage on a 0–100 scale
    pub fn score(&self) -> f64 {
        self.ratio * 100.0
    }

    /// Size of the vocabulary this result was computed against
    pub fn total(&self) -> usize {
        self.matched.len() + self.missing.len()
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

// ============================================================================
// Hallucination
// ============================================================================

/// Which rule of the hallucination policy produced the penalty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyRule {
    /// Extra-ratio threshold table
    CoarseBand,
    /// Extra content explained by connective / elaboration markers
    ExplanatoryElaboration,
    /// Extra numeric or date tokens absent from the reference
    NumericAddition,
    /// Penalty proportional to the extra ratio
    Continuous,
}

/// Outcome of hallucination detection for one answer. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HallucinationResult {
    /// |answer tokens − vocabulary| / |answer tokens|
    pub extra_ratio: f64,
    pub penalty: f64,
    /// Human-readable classification for operators reviewing the flag
    pub label: String,
    pub rule: PenaltyRule,
    /// Distinct answer tokens considered
    pub answer_token_count: usize,
    /// Answer tokens not explained by the vocabulary, in answer order
    pub extra_tokens: Vec<String>,
    /// Numeric / date tokens absent from the vocabulary
    pub extra_numeric: Vec<String>,
    /// Explanatory markers found in the answer
    pub explanatory_markers: Vec<String>,
    /// Extra numeric tokens overridden by the explanatory rule
    pub masked_numeric: usize,
}

impl HallucinationResult {
    /// True when the explanatory rule hid numeric additions that would
    /// otherwise have been penalized more heavily.
    pub fn needs_review(&self) -> bool {
        self.masked_numeric > 0
    }
}

// ============================================================================
// Layers
// ============================================================================

/// Signal layers that can be blended into a composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    #[serde(rename = "keyword", alias = "keyword_coverage")]
    KeywordCoverage,
    #[serde(rename = "semantic", alias = "semantic_similarity")]
    SemanticSimilarity,
    #[serde(rename = "judge", alias = "gpt", alias = "judge_score")]
    JudgeScore,
}

impl Layer {
    pub const ALL: [Layer; 3] = [
        Layer::KeywordCoverage,
        Layer::SemanticSimilarity,
        Layer::JudgeScore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::KeywordCoverage => "keyword",
            Layer::SemanticSimilarity => "semantic",
            Layer::JudgeScore => "judge",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_dedup_preserves_order() {
        let vocab = ReferenceVocabulary::from_tokens(["b", "a", "b", " ", "c", "a"]);
        assert_eq!(vocab.tokens(), ["b", "a", "c"]);
    }

    #[test]
    fn test_vocabulary_serde_enforces_dedup() {
        let vocab: ReferenceVocabulary = serde_json::from_str(r#"["電焊","電焊","切割"]"#).unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(serde_json::to_string(&vocab).unwrap(), r#"["電焊","切割"]"#);
    }

    #[test]
    fn test_vacuous_coverage() {
        let result = CoverageResult::vacuous();
        assert_eq!(result.ratio, 1.0);
        assert_eq!(result.score(), 100.0);
        assert_eq!(result.total(), 0);
        assert!(result.is_complete());
    }

    #[test]
    fn test_layer_serde_names() {
        let layer: Layer = serde_json::from_str(r#""gpt""#).unwrap();
        assert_eq!(layer, Layer::JudgeScore);
        assert_eq!(
            serde_json::to_string(&Layer::KeywordCoverage).unwrap(),
            r#""keyword""#
        );
    }

    #[test]
    fn test_layer_ordering_is_stable() {
        let mut layers = vec![Layer::JudgeScore, Layer::KeywordCoverage, Layer::SemanticSimilarity];
        layers.sort();
        assert_eq!(layers, Layer::ALL.to_vec());
    }
}
