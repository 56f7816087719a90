//! Keyword coverage
//!
//! A vocabulary token is *matched* when it occurs as a substring of the
//! answer, or when one of its synonyms does. Both sides are width-normalized
//! first so `（` and `(` compare equal. Matching is binary per token; there is
//! no partial credit.

use crate::errors::{Result, ScoringError};
use crate::nlp::normalize::normalize_for_matching;
use crate::nlp::terms::SynonymGroups;
use crate::types::{CoverageResult, ReferenceVocabulary, SynonymHit};
use serde::{Deserialize, Serialize};

/// Which synonym groups apply to a keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynonymScope {
    /// Only the group whose canonical key equals the keyword
    #[default]
    Exact,
    /// Every group whose canonical key occurs inside the keyword
    /// (`包商` variants also count for `包商名稱`)
    Contained,
}

/// Matching options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageOptions {
    /// Lower-case both sides before matching (default: case-sensitive)
    pub case_insensitive: bool,
    pub synonym_scope: SynonymScope,
}

/// Scores vocabulary coverage of answers
#[derive(Debug, Clone, Default)]
pub struct CoverageScorer {
    synonyms: Option<SynonymGroups>,
    options: CoverageOptions,
}

impl CoverageScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: resolve keywords through these synonym groups
    pub fn with_synonyms(mut self, synonyms: SynonymGroups) -> Self {
        self.synonyms = Some(synonyms);
        self
    }

    /// Builder method: set matching options
    pub fn with_options(mut self, options: CoverageOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CoverageOptions {
        &self.options
    }

    fn prepare(&self, text: &str) -> String {
        normalize_for_matching(text, self.options.case_insensitive)
    }

    /// Score `answer` against `vocabulary`.
    ///
    /// An empty vocabulary has nothing to miss and scores 1.0, unless the
    /// answer is empty too, in which case there is nothing to assess and an
    /// input error is returned.
    pub fn score(&self, vocabulary: &ReferenceVocabulary, answer: &str) -> Result<CoverageResult> {
        if vocabulary.is_empty() {
            if answer.trim().is_empty() {
                return Err(ScoringError::input(
                    "reference vocabulary and answer are both empty",
                ));
            }
            return Ok(CoverageResult::vacuous());
        }

        let haystack = self.prepare(answer);
        let mut matched = Vec::new();
        let mut missing = Vec::new();
        let mut synonym_hits = Vec::new();

        for token in vocabulary.iter() {
            let needle = self.prepare(token);
            if !needle.trim().is_empty() && haystack.contains(&needle) {
                matched.push(token.to_string());
            } else if let Some(variant) = self.matching_variant(token, &haystack) {
                matched.push(token.to_string());
                synonym_hits.push(SynonymHit {
                    keyword: token.to_string(),
                    variant,
                });
            } else {
                missing.push(token.to_string());
            }
        }

        let ratio = matched.len() as f64 / vocabulary.len() as f64;
        Ok(CoverageResult {
            matched,
            missing,
            synonym_hits,
            ratio,
        })
    }

    /// First synonym of `keyword` found in the (already prepared) haystack
    fn matching_variant(&self, keyword: &str, haystack: &str) -> Option<String> {
        let groups = self.synonyms.as_ref()?;
        let found = |variant: &&String| {
            let needle = self.prepare(variant);
            !needle.trim().is_empty() && haystack.contains(&needle)
        };

        match self.options.synonym_scope {
            SynonymScope::Exact => groups.variants(keyword).iter().find(found).cloned(),
            SynonymScope::Contained => groups
                .groups_within(keyword)
                .find_map(|(_, variants)| variants.iter().find(found))
                .cloned(),
        }
    }
}
