//! Evaluation configuration
//!
//! [`EvaluationConfig`] gathers every tunable of an evaluation run in one
//! serde-deserializable object. All fields have defaults, so a JSON config
//! only needs to name what it changes:
//!
//! ```json
//! {
//!   "protected_terms": ["工作許可證", "施工轄區"],
//!   "hallucination_mode": "graded",
//!   "scoring": { "policy": "legacy", "penalty_weight": "v2" },
//!   "runtime": { "max_threads": 4 }
//! }
//! ```

use crate::errors::{Result, ScoringError};
use crate::nlp::terms::{ProtectedTermSet, SynonymGroups};
use crate::scoring::composite::ScoringPolicy;
use crate::scoring::coverage::CoverageOptions;
use crate::scoring::hallucination::{HallucinationMode, HallucinationPolicy};
use crate::scoring::judge::DimensionWeights;
use crate::summary::SummaryThresholds;
use serde::{Deserialize, Serialize};

/// Threading controls for batch evaluation and weight sweeps.
///
/// Parallelism never changes results; it only changes throughput.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Maximum number of Rayon threads. `None` uses Rayon's default.
    pub max_threads: Option<usize>,
    /// Equivalent to `max_threads: 1`; overrides it when set.
    pub single_thread: bool,
    /// Use `par_iter` at all. When `false`, work runs on the calling thread.
    pub parallel: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            max_threads: None,
            single_thread: false,
            parallel: true,
        }
    }
}

impl RuntimeOptions {
    /// Run everything on the calling thread
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    /// Resolve the effective thread count.
    ///
    /// - `single_thread == true` → `Some(1)`
    /// - `max_threads == Some(n)` → `Some(n)`
    /// - otherwise → `None` (use Rayon default)
    pub fn effective_threads(&self) -> Option<usize> {
        if self.single_thread {
            Some(1)
        } else {
            self.max_threads
        }
    }

    /// Build a Rayon thread pool matching these options.
    ///
    /// Returns `None` when no thread limit is set (use global pool).
    pub fn build_thread_pool(&self) -> Result<Option<rayon::ThreadPool>> {
        self.effective_threads()
            .map(|n| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| {
                        ScoringError::configuration(format!("failed to build thread pool: {}", e))
                    })
            })
            .transpose()
    }

    /// Execute `f` within a scoped Rayon pool matching these options, so any
    /// `par_iter()` inside `f` uses it. Without a thread limit `f` runs
    /// directly on the global pool.
    pub fn scoped<R: Send>(&self, f: impl FnOnce() -> R + Send) -> Result<R> {
        Ok(match self.build_thread_pool()? {
            Some(pool) => pool.install(f),
            None => f(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_threads == Some(0) {
            return Err(ScoringError::configuration("max_threads must be > 0"));
        }
        Ok(())
    }
}

/// Configuration for an evaluation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Phrases never split by segmentation
    pub protected_terms: ProtectedTermSet,
    /// Synonym groups for coverage matching; `None` disables synonyms
    pub synonyms: Option<SynonymGroups>,
    /// Extra words for splitting CJK runs in the default tokenizer
    pub lexicon: Vec<String>,
    pub coverage: CoverageOptions,
    pub hallucination_mode: HallucinationMode,
    pub hallucination: HallucinationPolicy,
    pub scoring: ScoringPolicy,
    /// When set, judge layer scores are recomputed from these dimension
    /// weights instead of taking the payload's `overall`
    pub judge_dimensions: Option<DimensionWeights>,
    pub summary: SummaryThresholds,
    pub runtime: RuntimeOptions,
}

impl EvaluationConfig {
    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.hallucination.validate()?;
        self.scoring.validate()?;
        self.summary.validate()?;
        self.runtime.validate()?;
        Ok(())
    }

    /// Builder method: set protected terms
    pub fn with_protected_terms(mut self, terms: ProtectedTermSet) -> Self {
        self.protected_terms = terms;
        self
    }

    /// Builder method: enable synonym matching
    pub fn with_synonyms(mut self, synonyms: SynonymGroups) -> Self {
        self.synonyms = Some(synonyms);
        self
    }

    /// Builder method: add tokenizer lexicon words
    pub fn with_lexicon<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lexicon.extend(words.into_iter().map(Into::into));
        self
    }

    /// Builder method: set coverage options
    pub fn with_coverage(mut self, options: CoverageOptions) -> Self {
        self.coverage = options;
        self
    }

    /// Builder method: set hallucination mode
    pub fn with_hallucination_mode(mut self, mode: HallucinationMode) -> Self {
        self.hallucination_mode = mode;
        self
    }

    /// Builder method: set hallucination policy
    pub fn with_hallucination_policy(mut self, policy: HallucinationPolicy) -> Self {
        self.hallucination = policy;
        self
    }

    /// Builder method: set scoring policy
    pub fn with_scoring(mut self, policy: ScoringPolicy) -> Self {
        self.scoring = policy;
        self
    }

    /// Builder method: recompute judge scores from dimension weights
    pub fn with_judge_dimensions(mut self, weights: DimensionWeights) -> Self {
        self.judge_dimensions = Some(weights);
        self
    }

    /// Builder method: set runtime options
    pub fn with_runtime(mut self, runtime: RuntimeOptions) -> Self {
        self.runtime = runtime;
        self
    }
}
