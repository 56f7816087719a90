//! Hallucination detection
//!
//! Measures how much of an answer's vocabulary the reference cannot explain
//! and maps that excess to a penalty with a textual classification.
//!
//! Three policies share one contract:
//!
//! - **Coarse**: the extra ratio is looked up in a band table.
//! - **Graded**: explanatory elaboration and extra numeric/date tokens are
//!   classified before falling back to the coarse table.
//! - **Continuous**: penalty proportional to the extra ratio.
//!
//! All thresholds live in [`PenaltyTable`]s evaluated first-match, so a
//! policy is plain data and can be tested in isolation.

use crate::errors::{Result, ScoringError};
use crate::keywords::extraction::{scan_tokens, strip_enumeration_markers, MIN_TOKEN_CHARS};
use crate::nlp::normalize::normalize_width;
use crate::nlp::terms::ProtectedTermSet;
use crate::nlp::tokenizer::{Segmenter, Tokenizer};
use crate::types::{HallucinationResult, PenaltyRule, ReferenceVocabulary};
use regex::Regex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Dates are matched before bare numbers so `2024/01/05` is one token.
static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9]{4}[-/][0-9]{1,2}[-/][0-9]{1,2}|[0-9]{1,2}[-/][0-9]{1,2}")
        .expect("date pattern is valid")
});

static NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?").expect("number pattern is valid"));

// ============================================================================
// Penalty tables
// ============================================================================

/// One row of a penalty table: values below `upper_bound` get `penalty`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyBand {
    pub upper_bound: f64,
    pub penalty: f64,
    pub label: String,
}

impl PenaltyBand {
    pub fn new(upper_bound: f64, penalty: f64, label: impl Into<String>) -> Self {
        Self {
            upper_bound,
            penalty,
            label: label.into(),
        }
    }
}

/// Penalty and label assigned when no band matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyOutcome {
    pub penalty: f64,
    pub label: String,
}

/// Ordered bands evaluated first-match, plus a catch-all outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyTable {
    pub bands: Vec<PenaltyBand>,
    pub otherwise: PenaltyOutcome,
}

impl PenaltyTable {
    /// Build and validate a table
    pub fn new(bands: Vec<PenaltyBand>, penalty: f64, label: impl Into<String>) -> Result<Self> {
        let table = Self {
            bands,
            otherwise: PenaltyOutcome {
                penalty,
                label: label.into(),
            },
        };
        table.validate()?;
        Ok(table)
    }

    /// Extra-ratio bands: `<0.2→0`, `<0.4→25`, `<0.6→50`, else `100`
    pub fn coarse() -> Self {
        Self {
            bands: vec![
                PenaltyBand::new(0.2, 0.0, "grounded in reference"),
                PenaltyBand::new(0.4, 25.0, "minor unsupported content"),
                PenaltyBand::new(0.6, 50.0, "substantial unsupported content"),
            ],
            otherwise: PenaltyOutcome {
                penalty: 100.0,
                label: "predominantly unsupported content".to_string(),
            },
        }
    }

    /// Extra numeric token counts: up to 2 → 25, more → 50
    pub fn numeric_additions() -> Self {
        Self {
            bands: vec![PenaltyBand::new(3.0, 25.0, "minor numeric addition")],
            otherwise: PenaltyOutcome {
                penalty: 50.0,
                label: "extensive unsupported content".to_string(),
            },
        }
    }

    /// First band whose upper bound exceeds `value`, else the catch-all
    pub fn lookup(&self, value: f64) -> (f64, &str) {
        self.bands
            .iter()
            .find(|band| value < band.upper_bound)
            .map(|band| (band.penalty, band.label.as_str()))
            .unwrap_or((self.otherwise.penalty, self.otherwise.label.as_str()))
    }

    /// Bounds must be finite and strictly ascending; penalties finite and
    /// non-negative.
    pub fn validate(&self) -> Result<()> {
        let mut previous = f64::NEG_INFINITY;
        for band in &self.bands {
            if !band.upper_bound.is_finite() || band.upper_bound <= previous {
                return Err(ScoringError::configuration(format!(
                    "penalty band bounds must be finite and strictly ascending, got {} after {}",
                    band.upper_bound, previous
                )));
            }
            check_penalty(band.penalty)?;
            previous = band.upper_bound;
        }
        check_penalty(self.otherwise.penalty)
    }
}

fn check_penalty(penalty: f64) -> Result<()> {
    if !penalty.is_finite() || penalty < 0.0 {
        return Err(ScoringError::configuration(format!(
            "penalty must be finite and >= 0, got {}",
            penalty
        )));
    }
    Ok(())
}

// ============================================================================
// Policy
// ============================================================================

/// Selects which hallucination policy runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HallucinationMode {
    #[default]
    Coarse,
    Graded,
    Continuous,
}

/// Order of the first two graded rules.
///
/// `ExplanationFirst` lets an explanatory marker mask extra numeric content;
/// the masked count is reported in
/// [`HallucinationResult::masked_numeric`] so the case can be reviewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationPrecedence {
    #[default]
    ExplanationFirst,
    NumericFirst,
}

/// Thresholds and markers for all hallucination modes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HallucinationPolicy {
    pub coarse_bands: PenaltyTable,
    /// Keyed by the number of extra numeric/date tokens
    pub numeric_bands: PenaltyTable,
    pub explanatory_penalty: f64,
    pub explanatory_label: String,
    pub explanatory_markers: Vec<String>,
    /// Label reported by continuous mode at any ratio
    pub continuous_label: String,
    /// Distinct markers required before the answer counts as explanatory
    pub min_explanatory_markers: usize,
    pub precedence: ExplanationPrecedence,
}

impl Default for HallucinationPolicy {
    fn default() -> Self {
        Self {
            coarse_bands: PenaltyTable::coarse(),
            numeric_bands: PenaltyTable::numeric_additions(),
            explanatory_penalty: 10.0,
            explanatory_label: "explanatory elaboration".to_string(),
            explanatory_markers: [
                "因此", "所以", "包括", "例如", "如", "即", "也就是", "用於", "目的",
                "because", "therefore", "for example", "such as", "including", "i.e.",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            continuous_label: "proportional unsupported content".to_string(),
            min_explanatory_markers: 4,
            precedence: ExplanationPrecedence::ExplanationFirst,
        }
    }
}

impl HallucinationPolicy {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.coarse_bands.validate()?;
        self.numeric_bands.validate()?;
        check_penalty(self.explanatory_penalty)?;
        if self.min_explanatory_markers == 0 {
            return Err(ScoringError::configuration(
                "min_explanatory_markers must be > 0",
            ));
        }
        Ok(())
    }

    /// Builder method: set rule precedence
    pub fn with_precedence(mut self, precedence: ExplanationPrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Builder method: set how many distinct markers make an answer explanatory
    pub fn with_min_explanatory_markers(mut self, count: usize) -> Self {
        self.min_explanatory_markers = count;
        self
    }
}

// ============================================================================
// Detector
// ============================================================================

/// Detects unsupported content in answers
#[derive(Debug, Clone)]
pub struct HallucinationDetector<S: Segmenter = Tokenizer> {
    policy: HallucinationPolicy,
    protected: ProtectedTermSet,
    segmenter: S,
}

impl HallucinationDetector<Tokenizer> {
    /// Create a detector using the default tokenizer
    pub fn new(policy: HallucinationPolicy) -> Self {
        Self::with_segmenter(policy, ProtectedTermSet::empty(), Tokenizer::new())
    }
}

impl Default for HallucinationDetector<Tokenizer> {
    fn default() -> Self {
        Self::new(HallucinationPolicy::default())
    }
}

impl<S: Segmenter> HallucinationDetector<S> {
    pub fn with_segmenter(
        policy: HallucinationPolicy,
        protected: ProtectedTermSet,
        segmenter: S,
    ) -> Self {
        Self {
            policy,
            protected,
            segmenter,
        }
    }

    /// Builder method: protected terms used when segmenting answers
    pub fn with_protected_terms(mut self, protected: ProtectedTermSet) -> Self {
        self.protected = protected;
        self
    }

    pub fn policy(&self) -> &HallucinationPolicy {
        &self.policy
    }

    /// Distinct answer tokens, in answer order.
    ///
    /// Vocabulary tokens are treated as protected terms so a reference
    /// phrase inside the answer survives as one token.
    fn answer_tokens(&self, vocabulary: &[String], answer: &str) -> Vec<String> {
        let protected = self.protected.union(vocabulary.iter().cloned());
        let mut seen = FxHashSet::default();
        scan_tokens(answer, &protected, &self.segmenter)
            .into_iter()
            .filter(|t| t.protected || t.text.chars().count() >= MIN_TOKEN_CHARS)
            .filter(|t| seen.insert(t.text))
            .map(|t| t.text.to_string())
            .collect()
    }

    /// Explanatory markers present in the answer, in policy order
    fn explanatory_markers(&self, answer: &str) -> Vec<String> {
        let lowered = answer.to_lowercase();
        self.policy
            .explanatory_markers
            .iter()
            .filter(|marker| !marker.is_empty() && lowered.contains(marker.to_lowercase().as_str()))
            .cloned()
            .collect()
    }

    /// Classify `answer` against `vocabulary` under `mode`.
    ///
    /// Deterministic: identical inputs always give identical results.
    pub fn detect(
        &self,
        vocabulary: &ReferenceVocabulary,
        answer: &str,
        mode: HallucinationMode,
    ) -> HallucinationResult {
        let answer = normalize_width(&strip_enumeration_markers(answer));
        let reference: Vec<String> = vocabulary.iter().map(normalize_width).collect();
        let reference_set: FxHashSet<&str> = reference.iter().map(String::as_str).collect();

        let tokens = self.answer_tokens(&reference, &answer);
        let extra_tokens: Vec<String> = tokens
            .iter()
            .filter(|t| !reference_set.contains(t.as_str()))
            .cloned()
            .collect();
        let extra_ratio = if tokens.is_empty() {
            0.0
        } else {
            extra_tokens.len() as f64 / tokens.len() as f64
        };

        let reference_numeric: FxHashSet<String> =
            numeric_tokens(&reference.join(" ")).into_iter().collect();
        let extra_numeric: Vec<String> = numeric_tokens(&answer)
            .into_iter()
            .filter(|n| !reference_numeric.contains(n))
            .collect();
        let explanatory_markers = self.explanatory_markers(&answer);

        let mut result = HallucinationResult {
            extra_ratio,
            penalty: 0.0,
            label: String::new(),
            rule: PenaltyRule::CoarseBand,
            answer_token_count: tokens.len(),
            extra_tokens,
            extra_numeric,
            explanatory_markers,
            masked_numeric: 0,
        };

        match mode {
            HallucinationMode::Coarse => self.apply_coarse(&mut result),
            HallucinationMode::Continuous => {
                result.label = self.policy.continuous_label.clone();
                result.penalty = extra_ratio.min(1.0) * 100.0;
                result.rule = PenaltyRule::Continuous;
            }
            HallucinationMode::Graded => self.apply_graded(&mut result),
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(
            mode = ?mode,
            extra_ratio = result.extra_ratio,
            penalty = result.penalty,
            rule = ?result.rule,
            "hallucination classified"
        );

        result
    }

    fn apply_coarse(&self, result: &mut HallucinationResult) {
        let (penalty, label) = self.policy.coarse_bands.lookup(result.extra_ratio);
        result.penalty = penalty;
        result.label = label.to_string();
        result.rule = PenaltyRule::CoarseBand;
    }

    fn apply_explanatory(&self, result: &mut HallucinationResult) {
        result.penalty = self.policy.explanatory_penalty;
        result.label = self.policy.explanatory_label.clone();
        result.rule = PenaltyRule::ExplanatoryElaboration;
    }

    fn apply_numeric(&self, result: &mut HallucinationResult) {
        let (penalty, label) = self
            .policy
            .numeric_bands
            .lookup(result.extra_numeric.len() as f64);
        result.penalty = penalty;
        result.label = label.to_string();
        result.rule = PenaltyRule::NumericAddition;
    }

    fn apply_graded(&self, result: &mut HallucinationResult) {
        self.apply_coarse(result);

        let has_numeric = !result.extra_numeric.is_empty();
        // Nothing beyond the reference: keep the coarse outcome
        if result.penalty == 0.0 && !has_numeric {
            return;
        }

        let explanatory = result.explanatory_markers.len() >= self.policy.min_explanatory_markers;

        match self.policy.precedence {
            ExplanationPrecedence::ExplanationFirst if explanatory => {
                self.apply_explanatory(result);
                if has_numeric {
                    result.masked_numeric = result.extra_numeric.len();
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        masked_numeric = result.masked_numeric,
                        "explanatory rule masked extra numeric content; review recommended"
                    );
                }
            }
            _ if has_numeric => self.apply_numeric(result),
            ExplanationPrecedence::NumericFirst if explanatory => self.apply_explanatory(result),
            _ => {}
        }
    }
}

/// Distinct numeric and date tokens in `text`, in order of appearance.
pub fn numeric_tokens(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, &str)> = Vec::new();
    let mut date_spans = Vec::new();

    for m in DATE_PATTERN.find_iter(text) {
        found.push((m.start(), m.as_str()));
        date_spans.push(m.range());
    }
    for m in NUMBER_PATTERN.find_iter(text) {
        let inside_date = date_spans
            .iter()
            .any(|span| span.start <= m.start() && m.end() <= span.end);
        if !inside_date {
            found.push((m.start(), m.as_str()));
        }
    }
    found.sort_by_key(|(start, _)| *start);

    let mut seen = FxHashSet::default();
    found
        .into_iter()
        .filter(|(_, token)| seen.insert(*token))
        .map(|(_, token)| token.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(tokens: &[&str]) -> ReferenceVocabulary {
        ReferenceVocabulary::from_tokens(tokens.iter().copied())
    }

    #[test]
    fn test_coarse_table_lookup() {
        let table = PenaltyTable::coarse();
        assert_eq!(table.lookup(0.0).0, 0.0);
        assert_eq!(table.lookup(0.15).0, 0.0);
        assert_eq!(table.lookup(0.2).0, 25.0);
        assert_eq!(table.lookup(0.39).0, 25.0);
        assert_eq!(table.lookup(0.55).0, 50.0);
        assert_eq!(table.lookup(0.6).0, 100.0);
        assert_eq!(table.lookup(5.0).0, 100.0);
    }

    #[test]
    fn test_numeric_table_lookup() {
        let table = PenaltyTable::numeric_additions();
        assert_eq!(table.lookup(1.0), (25.0, "minor numeric addition"));
        assert_eq!(table.lookup(2.0), (25.0, "minor numeric addition"));
        assert_eq!(table.lookup(3.0), (50.0, "extensive unsupported content"));
    }

    #[test]
    fn test_table_validation() {
        assert!(PenaltyTable::coarse().validate().is_ok());

        let unordered = PenaltyTable::new(
            vec![PenaltyBand::new(0.4, 10.0, "a"), PenaltyBand::new(0.2, 20.0, "b")],
            100.0,
            "c",
        );
        assert!(unordered.unwrap_err().is_configuration());

        let negative = PenaltyTable::new(vec![PenaltyBand::new(0.4, -1.0, "a")], 100.0, "c");
        assert!(negative.is_err());
    }

    #[test]
    fn test_numeric_tokens() {
        assert_eq!(
            numeric_tokens("於2024/01/05前完成，共3份，另需3份與12.5公斤"),
            vec!["2024/01/05", "3", "12.5"]
        );
        assert!(numeric_tokens("沒有數字").is_empty());
    }

    #[test]
    fn test_fully_grounded_answer() {
        let detector = HallucinationDetector::default();
        let v = vocab(&["工作許可證", "包商名稱"]);
        let result = detector.detect(&v, "工作許可證，包商名稱", HallucinationMode::Coarse);

        assert_eq!(result.answer_token_count, 2);
        assert_eq!(result.extra_ratio, 0.0);
        assert_eq!(result.penalty, 0.0);
        assert!(result.extra_tokens.is_empty());
    }

    #[test]
    fn test_empty_answer_has_zero_ratio() {
        let detector = HallucinationDetector::default();
        let result = detector.detect(&vocab(&["電焊"]), "", HallucinationMode::Coarse);
        assert_eq!(result.answer_token_count, 0);
        assert_eq!(result.extra_ratio, 0.0);
        assert_eq!(result.penalty, 0.0);
    }

    #[test]
    fn test_coarse_penalty_from_extra_ratio() {
        let detector = HallucinationDetector::default();
        let v = vocab(&["permit", "contractor"]);
        // 2 of 4 distinct tokens are extra → 0.5
        let answer = "permit contractor signature stamp";
        let result = detector.detect(&v, answer, HallucinationMode::Coarse);
        assert_eq!(result.extra_ratio, 0.5);
        assert_eq!(result.penalty, 50.0);
        assert_eq!(result.extra_tokens, ["signature", "stamp"]);
        assert_eq!(result.rule, PenaltyRule::CoarseBand);
    }

    #[test]
    fn test_continuous_penalty() {
        let detector = HallucinationDetector::default();
        let v = vocab(&["permit", "contractor"]);
        let answer = "permit contractor signature stamp";
        let result = detector.detect(&v, answer, HallucinationMode::Continuous);
        assert_eq!(result.penalty, 50.0);
        assert_eq!(result.rule, PenaltyRule::Continuous);
        assert_eq!(result.label, "proportional unsupported content");
    }

    #[test]
    fn test_continuous_label_at_low_ratio() {
        let detector = HallucinationDetector::default();
        let v = vocab(&["permit", "contractor", "signature", "welding", "cutting"]);
        // 1 of 6 distinct tokens is extra, below the lowest coarse band
        let result = detector.detect(
            &v,
            "permit contractor signature welding cutting bay",
            HallucinationMode::Continuous,
        );
        assert!((result.penalty - 100.0 / 6.0).abs() < 1e-9);
        assert!(result.penalty > 0.0);
        assert_eq!(result.label, "proportional unsupported content");
        assert_ne!(result.label, PenaltyTable::coarse().lookup(result.extra_ratio).1);
    }

    #[test]
    fn test_graded_numeric_addition() {
        let detector = HallucinationDetector::default();
        let v = vocab(&["permit", "contractor"]);

        let answer = "permit contractor valid 30 days";
        let minor = detector.detect(&v, answer, HallucinationMode::Graded);
        assert_eq!(minor.extra_numeric, ["30"]);
        assert_eq!(minor.penalty, 25.0);
        assert_eq!(minor.label, "minor numeric addition");
        assert_eq!(minor.rule, PenaltyRule::NumericAddition);

        let many = detector.detect(
            &v,
            "permit contractor 30 days 5 workers 2024/03/01",
            HallucinationMode::Graded,
        );
        assert_eq!(many.extra_numeric.len(), 3);
        assert_eq!(many.penalty, 50.0);
        assert_eq!(many.label, "extensive unsupported content");
    }

    #[test]
    fn test_graded_explanatory_elaboration() {
        let detector = HallucinationDetector::new(
            HallucinationPolicy::default().with_min_explanatory_markers(2),
        );
        let v = vocab(&["permit"]);
        let result = detector.detect(
            &v,
            "permit is required because hot work, for example welding, is dangerous",
            HallucinationMode::Graded,
        );
        assert_eq!(result.penalty, 10.0);
        assert_eq!(result.label, "explanatory elaboration");
        assert_eq!(result.rule, PenaltyRule::ExplanatoryElaboration);
        assert!(!result.needs_review());
    }

    #[test]
    fn test_graded_explanation_masks_numbers_and_is_flagged() {
        let policy = HallucinationPolicy::default().with_min_explanatory_markers(2);
        let answer = "permit because welding, for example 30 days 5 workers 9 shifts";
        let v = vocab(&["permit"]);

        let lenient = HallucinationDetector::new(policy.clone());
        let result = lenient.detect(&v, answer, HallucinationMode::Graded);
        assert_eq!(result.penalty, 10.0);
        assert_eq!(result.masked_numeric, 3);
        assert!(result.needs_review());

        let strict = HallucinationDetector::new(
            policy.with_precedence(ExplanationPrecedence::NumericFirst),
        );
        let result = strict.detect(&v, answer, HallucinationMode::Graded);
        assert_eq!(result.penalty, 50.0);
        assert_eq!(result.masked_numeric, 0);
    }

    #[test]
    fn test_extra_dates_share_numeric_bands() {
        let detector = HallucinationDetector::new(
            HallucinationPolicy::default().with_precedence(ExplanationPrecedence::NumericFirst),
        );
        let v = vocab(&["permit"]);
        let answer = "permit 2024/03/01 2024/04/01";
        let result = detector.detect(&v, answer, HallucinationMode::Graded);
        assert_eq!(result.extra_numeric, ["2024/03/01", "2024/04/01"]);
        assert_eq!(result.rule, PenaltyRule::NumericAddition);
        assert_eq!(result.penalty, 25.0);

        let split = HallucinationPolicy {
            numeric_bands: PenaltyTable::new(
                vec![PenaltyBand::new(2.0, 25.0, "minor numeric addition")],
                50.0,
                "extensive unsupported content",
            )
            .unwrap(),
            ..HallucinationPolicy::default()
        };
        let result = HallucinationDetector::new(split).detect(&v, answer, HallucinationMode::Graded);
        assert_eq!(result.penalty, 50.0);
    }

    #[test]
    fn test_graded_falls_back_to_coarse() {
        let detector = HallucinationDetector::default();
        let v = vocab(&["permit"]);
        let result = detector.detect(&v, "permit signature stamp", HallucinationMode::Graded);
        assert_eq!(result.rule, PenaltyRule::CoarseBand);
        assert_eq!(result.penalty, 100.0);
    }

    #[test]
    fn test_reference_numbers_are_not_extra() {
        let detector = HallucinationDetector::default();
        let v = vocab(&["8小時", "通報"]);
        let result = detector.detect(&v, "8小時內通報", HallucinationMode::Graded);
        assert!(result.extra_numeric.is_empty());
    }

    #[test]
    fn test_full_width_digits_normalized() {
        let detector = HallucinationDetector::default();
        let v = vocab(&["permit"]);
        let result = detector.detect(&v, "permit ３０ days", HallucinationMode::Graded);
        assert_eq!(result.extra_numeric, ["30"]);
    }
}
