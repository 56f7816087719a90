//! Judge payload validation
//!
//! An external judge (usually an LLM) returns a JSON object with scores for
//! four dimensions plus an overall score. This module checks that payload at
//! the boundary: anything missing, non-numeric or out of range is rejected
//! with an external-payload error before it reaches composite scoring.
//!
//! Each dimension may be a bare number or an object `{"score": n,
//! "reasoning": "..."}`. Soft problems are reported as [`JudgeWarning`]s
//! alongside the parsed score instead of failing.

use crate::errors::{Result, ScoringError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Maximum tolerated gap between `overall` and the dimension mean before a
/// warning is raised
pub const OVERALL_DEVIATION_TOLERANCE: f64 = 10.0;

// ─── Dimensions ─────────────────────────────────────────────────────────────

/// A scored judge dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeDimension {
    Relevance,
    Completeness,
    Accuracy,
    Faithfulness,
}

impl JudgeDimension {
    pub const ALL: [JudgeDimension; 4] = [
        JudgeDimension::Relevance,
        JudgeDimension::Completeness,
        JudgeDimension::Accuracy,
        JudgeDimension::Faithfulness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JudgeDimension::Relevance => "relevance",
            JudgeDimension::Completeness => "completeness",
            JudgeDimension::Accuracy => "accuracy",
            JudgeDimension::Faithfulness => "faithfulness",
        }
    }
}

impl std::fmt::Display for JudgeDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Score ──────────────────────────────────────────────────────────────────

/// A validated judge score. All numeric fields are within [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeScore {
    pub relevance: f64,
    pub completeness: f64,
    pub accuracy: f64,
    pub faithfulness: f64,
    pub overall: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub dimension_reasoning: BTreeMap<JudgeDimension, String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub question_id: Option<String>,
}

fn check_range(field: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(ScoringError::external_payload(format!(
            "judge field '{}' must be within [0, 100], got {}",
            field, value
        )));
    }
    Ok(value)
}

impl JudgeScore {
    /// Build a score from the five numeric fields
    pub fn new(
        relevance: f64,
        completeness: f64,
        accuracy: f64,
        faithfulness: f64,
        overall: f64,
    ) -> Result<Self> {
        Ok(Self {
            relevance: check_range("relevance", relevance)?,
            completeness: check_range("completeness", completeness)?,
            accuracy: check_range("accuracy", accuracy)?,
            faithfulness: check_range("faithfulness", faithfulness)?,
            overall: check_range("overall", overall)?,
            reasoning: None,
            dimension_reasoning: BTreeMap::new(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            question_id: None,
        })
    }

    pub fn dimension(&self, dimension: JudgeDimension) -> f64 {
        match dimension {
            JudgeDimension::Relevance => self.relevance,
            JudgeDimension::Completeness => self.completeness,
            JudgeDimension::Accuracy => self.accuracy,
            JudgeDimension::Faithfulness => self.faithfulness,
        }
    }

    /// Unweighted mean of the four dimensions
    pub fn dimension_mean(&self) -> f64 {
        JudgeDimension::ALL
            .iter()
            .map(|d| self.dimension(*d))
            .sum::<f64>()
            / JudgeDimension::ALL.len() as f64
    }

    /// Overall score recomputed from the selected dimensions
    pub fn overall_with(&self, weights: &DimensionWeights) -> f64 {
        weights
            .iter()
            .map(|(dimension, w)| w * self.dimension(dimension))
            .sum()
    }

    /// Parse a judge payload from a JSON value
    pub fn from_value(value: &Value) -> Result<JudgePayload> {
        let object = value.as_object().ok_or_else(|| {
            ScoringError::external_payload("judge payload must be a JSON object")
        })?;

        let mut dimension_reasoning = BTreeMap::new();
        let mut dim = |d: JudgeDimension| -> Result<f64> {
            let (score, reasoning) = read_scored_field(object, d.as_str())?;
            if let Some(reasoning) = reasoning {
                dimension_reasoning.insert(d, reasoning);
            }
            Ok(score)
        };
        let relevance = dim(JudgeDimension::Relevance)?;
        let completeness = dim(JudgeDimension::Completeness)?;
        let accuracy = dim(JudgeDimension::Accuracy)?;
        let faithfulness = dim(JudgeDimension::Faithfulness)?;
        let (overall, _) = read_scored_field(object, "overall")?;

        let mut score = Self::new(relevance, completeness, accuracy, faithfulness, overall)?;
        score.dimension_reasoning = dimension_reasoning;
        score.reasoning = read_optional_string(object, "reasoning")?;
        score.strengths = read_string_list(object, "strengths")?;
        score.weaknesses = read_string_list(object, "weaknesses")?;
        score.question_id = match object.get("question_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(other) => {
                return Err(ScoringError::external_payload(format!(
                    "judge field 'question_id' must be a string or number, got {}",
                    other
                )))
            }
        };

        let warnings = score.warnings();
        Ok(JudgePayload { score, warnings })
    }

    /// Parse a judge payload from a JSON string
    pub fn from_json_str(json: &str) -> Result<JudgePayload> {
        let value: Value = serde_json::from_str(json).map_err(|e| {
            ScoringError::external_payload(format!("judge payload is not valid JSON: {}", e))
        })?;
        Self::from_value(&value)
    }

    /// Parse a free-text judge response that embeds a JSON object,
    /// e.g. wrapped in a markdown code fence or surrounded by prose.
    ///
    /// The outermost `{ ... }` span is taken as the payload.
    pub fn from_response_text(text: &str) -> Result<JudgePayload> {
        let span = text
            .find('{')
            .zip(text.rfind('}'))
            .filter(|(start, end)| start < end)
            .map(|(start, end)| &text[start..=end])
            .ok_or_else(|| {
                ScoringError::external_payload("judge response contains no JSON object")
            })?;
        Self::from_json_str(span)
    }

    fn warnings(&self) -> Vec<JudgeWarning> {
        let mut warnings = Vec::new();
        if self.reasoning.as_deref().map_or(true, |r| r.trim().is_empty()) {
            warnings.push(JudgeWarning {
                kind: JudgeWarningKind::MissingReasoning,
                message: "judge payload has no overall reasoning".to_string(),
            });
        }
        let mean = self.dimension_mean();
        if (self.overall - mean).abs() > OVERALL_DEVIATION_TOLERANCE {
            warnings.push(JudgeWarning {
                kind: JudgeWarningKind::OverallDeviation,
                message: format!(
                    "overall {} deviates from dimension mean {:.2} by more than {}",
                    self.overall, mean, OVERALL_DEVIATION_TOLERANCE
                ),
            });
        }
        warnings
    }
}

/// Read a field that is either a number or `{"score": n, "reasoning": s}`
fn read_scored_field(object: &Map<String, Value>, field: &str) -> Result<(f64, Option<String>)> {
    match object.get(field) {
        None | Some(Value::Null) => Err(ScoringError::external_payload(format!(
            "judge payload is missing '{}'",
            field
        ))),
        Some(Value::Number(n)) => Ok((number(field, n)?, None)),
        Some(Value::Object(inner)) => match inner.get("score") {
            Some(Value::Number(n)) => {
                let score = number(field, n)?;
                Ok((score, read_optional_string(inner, "reasoning")?))
            }
            _ => Err(ScoringError::external_payload(format!(
                "judge field '{}.score' must be a number",
                field
            ))),
        },
        Some(other) => Err(ScoringError::external_payload(format!(
            "judge field '{}' must be a number, got {}",
            field, other
        ))),
    }
}

fn number(field: &str, n: &serde_json::Number) -> Result<f64> {
    let value = n.as_f64().ok_or_else(|| {
        ScoringError::external_payload(format!(
            "judge field '{}' is not representable as f64",
            field
        ))
    })?;
    check_range(field, value)
}

fn read_optional_string(object: &Map<String, Value>, field: &str) -> Result<Option<String>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ScoringError::external_payload(format!(
            "judge field '{}' must be a string, got {}",
            field, other
        ))),
    }
}

/// A list of strings; a single string is accepted as a one-item list
fn read_string_list(object: &Map<String, Value>, field: &str) -> Result<Vec<String>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(ScoringError::external_payload(format!(
                    "judge field '{}' must contain strings, got {}",
                    field, other
                ))),
            })
            .collect(),
        Some(other) => Err(ScoringError::external_payload(format!(
            "judge field '{}' must be a list of strings, got {}",
            field, other
        ))),
    }
}

// ─── Warnings ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeWarningKind {
    MissingReasoning,
    OverallDeviation,
}

/// A soft problem with an otherwise valid payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeWarning {
    pub kind: JudgeWarningKind,
    pub message: String,
}

/// A parsed score plus any soft warnings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgePayload {
    pub score: JudgeScore,
    pub warnings: Vec<JudgeWarning>,
}

impl JudgePayload {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

// ─── Dimension weights ──────────────────────────────────────────────────────

/// Normalized weights over judge dimensions.
///
/// Dimensions left out do not contribute. Weights are rescaled to sum to 1;
/// an all-zero set is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<JudgeDimension, f64>", into = "BTreeMap<JudgeDimension, f64>")]
pub struct DimensionWeights {
    weights: BTreeMap<JudgeDimension, f64>,
}

impl DimensionWeights {
    pub fn new(weights: impl IntoIterator<Item = (JudgeDimension, f64)>) -> Result<Self> {
        let weights: BTreeMap<JudgeDimension, f64> = weights.into_iter().collect();
        for (dimension, w) in &weights {
            if !w.is_finite() || *w < 0.0 {
                return Err(ScoringError::configuration(format!(
                    "dimension weight for '{}' must be finite and >= 0, got {}",
                    dimension, w
                )));
            }
        }
        let sum: f64 = weights.values().sum();
        if sum <= 0.0 {
            return Err(ScoringError::configuration(
                "dimension weights must have a positive sum",
            ));
        }
        Ok(Self {
            weights: weights.into_iter().map(|(d, w)| (d, w / sum)).collect(),
        })
    }

    /// Normalized weights in [`JudgeDimension`] order
    pub fn iter(&self) -> impl Iterator<Item = (JudgeDimension, f64)> + '_ {
        self.weights.iter().map(|(d, w)| (*d, *w))
    }

    pub fn get(&self, dimension: JudgeDimension) -> Option<f64> {
        self.weights.get(&dimension).copied()
    }
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            weights: JudgeDimension::ALL.iter().map(|d| (*d, 0.25)).collect(),
        }
    }
}

impl TryFrom<BTreeMap<JudgeDimension, f64>> for DimensionWeights {
    type Error = ScoringError;

    fn try_from(weights: BTreeMap<JudgeDimension, f64>) -> Result<Self> {
        Self::new(weights)
    }
}

impl From<DimensionWeights> for BTreeMap<JudgeDimension, f64> {
    fn from(weights: DimensionWeights) -> Self {
        weights.weights
    }
}
