//! Keyword extraction
//!
//! Turns an "expected vocabulary" field into a [`ReferenceVocabulary`]:
//! protected terms are lifted out verbatim, the remaining text goes through
//! the [`Segmenter`], short tokens are dropped, and duplicates are removed
//! keeping first occurrence.

use crate::nlp::terms::ProtectedTermSet;
use crate::nlp::tokenizer::{Segmenter, Tokenizer};
use crate::types::ReferenceVocabulary;
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Tokens shorter than this (in chars) are dropped unless protected
pub const MIN_TOKEN_CHARS: usize = 2;

/// List markers such as `1.`, `2、`, `(3)` at the start of a line or after
/// whitespace. The trailing group keeps the following char so decimals like
/// `3.5` survive.
static ENUMERATION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(^|\s)[(（]?[0-9０-９]{1,2}[.．、)）]([^0-9０-９]|$)")
        .expect("enumeration marker pattern is valid")
});

/// A token produced by [`scan_tokens`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannedToken<'a> {
    pub text: &'a str,
    /// Whether the token came from the protected-term table
    pub protected: bool,
}

/// Replace list enumeration markers with whitespace.
pub fn strip_enumeration_markers(text: &str) -> Cow<'_, str> {
    ENUMERATION_MARKER.replace_all(text, "${1} ${2}")
}

/// Scan `text` left to right, emitting protected terms verbatim and
/// segmenting everything between them.
///
/// At each position the longest protected term wins; the scan resumes right
/// after it.
pub fn scan_tokens<'a, S: Segmenter + ?Sized>(
    text: &'a str,
    protected: &ProtectedTermSet,
    segmenter: &S,
) -> Vec<ScannedToken<'a>> {
    let mut tokens = Vec::new();
    let mut plain_start = 0;
    let mut pos = 0;

    let flush_plain = |start: usize, end: usize, tokens: &mut Vec<ScannedToken<'a>>| {
        if start < end {
            tokens.extend(
                segmenter
                    .segment(&text[start..end])
                    .into_iter()
                    .map(|t| ScannedToken {
                        text: t,
                        protected: false,
                    }),
            );
        }
    };

    while pos < text.len() {
        let rest = &text[pos..];
        if let Some(term) = protected.longest_prefix_of(rest) {
            flush_plain(plain_start, pos, &mut tokens);
            tokens.push(ScannedToken {
                text: &text[pos..pos + term.len()],
                protected: true,
            });
            pos += term.len();
            plain_start = pos;
        } else {
            pos += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    flush_plain(plain_start, text.len(), &mut tokens);

    tokens
}

/// Extracts reference vocabularies
#[derive(Debug, Clone)]
pub struct KeywordExtractor<S: Segmenter = Tokenizer> {
    protected: ProtectedTermSet,
    segmenter: S,
    strip_enumerations: bool,
}

impl KeywordExtractor<Tokenizer> {
    /// Create an extractor using the default tokenizer
    pub fn new(protected: ProtectedTermSet) -> Self {
        Self::with_segmenter(protected, Tokenizer::new())
    }
}

impl Default for KeywordExtractor<Tokenizer> {
    fn default() -> Self {
        Self::new(ProtectedTermSet::empty())
    }
}

impl<S: Segmenter> KeywordExtractor<S> {
    /// Create an extractor with a custom segmenter
    pub fn with_segmenter(protected: ProtectedTermSet, segmenter: S) -> Self {
        Self {
            protected,
            segmenter,
            strip_enumerations: true,
        }
    }

    /// Builder method: keep list markers like `1.` in the text
    pub fn keep_enumerations(mut self) -> Self {
        self.strip_enumerations = false;
        self
    }

    pub fn protected_terms(&self) -> &ProtectedTermSet {
        &self.protected
    }

    pub fn segmenter(&self) -> &S {
        &self.segmenter
    }

    /// Extract the reference vocabulary from `reference_text`.
    ///
    /// Empty or whitespace-only text yields an empty vocabulary.
    pub fn extract(&self, reference_text: &str) -> ReferenceVocabulary {
        let mut vocab = ReferenceVocabulary::new();
        if reference_text.trim().is_empty() {
            return vocab;
        }

        let text = if self.strip_enumerations {
            strip_enumeration_markers(reference_text)
        } else {
            Cow::Borrowed(reference_text)
        };

        for token in scan_tokens(&text, &self.protected, &self.segmenter) {
            let keep = token.protected || token.text.chars().count() >= MIN_TOKEN_CHARS;
            if keep {
                vocab.push(token.text);
            }
        }

        vocab
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_terms_emitted_verbatim() {
        let extractor = KeywordExtractor::new(ProtectedTermSet::work_permit());
        let vocab = extractor.extract("工作許可證、施工轄區、包商名稱");
        assert_eq!(vocab.tokens(), ["工作許可證", "施工轄區", "包商名稱"]);
    }

    #[test]
    fn test_longest_protected_match_first() {
        let protected = ProtectedTermSet::new(["承包商", "承包商現場負責人"]);
        let extractor = KeywordExtractor::new(protected);
        let vocab = extractor.extract("承包商現場負責人簽名");
        assert_eq!(vocab.tokens(), ["承包商現場負責人", "簽名"]);
    }

    #[test]
    fn test_order_of_occurrence_preserved() {
        let extractor = KeywordExtractor::new(ProtectedTermSet::work_permit());
        let vocab = extractor.extract("申請流程 工作許可證 作業內容");
        assert_eq!(vocab.tokens(), ["申請流程", "工作許可證", "作業內容"]);
    }

    #[test]
    fn test_single_char_tokens_dropped_unless_protected() {
        let extractor = KeywordExtractor::new(ProtectedTermSet::new(["火"]));
        let vocab = extractor.extract("a 火 b permit");
        assert_eq!(vocab.tokens(), ["火", "permit"]);
    }

    #[test]
    fn test_duplicates_removed() {
        let extractor = KeywordExtractor::new(ProtectedTermSet::work_permit());
        let vocab = extractor.extract("電焊，切割，電焊 permit permit");
        assert_eq!(vocab.tokens(), ["電焊", "切割", "permit"]);
    }

    #[test]
    fn test_enumeration_markers_stripped() {
        let extractor = KeywordExtractor::default();
        let vocab = extractor.extract("1. 申請流程\n2、包商名稱\n(3) 作業內容");
        assert_eq!(vocab.tokens(), ["申請流程", "包商名稱", "作業內容"]);
    }

    #[test]
    fn test_decimals_survive_marker_stripping() {
        let extractor = KeywordExtractor::default();
        let vocab = extractor.extract("voltage 3.5 kV");
        assert_eq!(vocab.tokens(), ["voltage", "3.5", "kV"]);
    }

    #[test]
    fn test_empty_reference() {
        let extractor = KeywordExtractor::new(ProtectedTermSet::work_permit());
        assert!(extractor.extract("").is_empty());
        assert!(extractor.extract("   \n\t").is_empty());
    }

    #[test]
    fn test_custom_segmenter() {
        struct Whitespace;
        impl Segmenter for Whitespace {
            fn segment<'a>(&self, text: &'a str) -> Vec<&'a str> {
                text.split_whitespace().collect()
            }
        }

        let extractor = KeywordExtractor::with_segmenter(ProtectedTermSet::empty(), Whitespace);
        let vocab = extractor.extract("hot-work permit x");
        assert_eq!(vocab.tokens(), ["hot-work", "permit"]);
    }
}
