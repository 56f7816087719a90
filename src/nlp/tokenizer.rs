//! Unicode-aware segmentation
//!
//! This module provides the [`Segmenter`] capability the scorers depend on,
//! and a default [`Tokenizer`] built on UAX #29 word boundaries.
//!
//! UAX #29 splits every CJK ideograph into its own segment, which is useless
//! for keyword work. The default tokenizer therefore glues contiguous CJK
//! segments back into runs and, when a lexicon is supplied, splits each run
//! by forward maximum matching against it.

use rustc_hash::FxHashSet;
use unicode_segmentation::UnicodeSegmentation;

/// Splits text into an ordered sequence of substrings.
///
/// Any general-purpose tokenizer satisfies this contract. Implementations
/// must be deterministic and should skip pure whitespace and punctuation.
pub trait Segmenter: Send + Sync {
    fn segment<'a>(&self, text: &'a str) -> Vec<&'a str>;
}

/// A Unicode-aware tokenizer following UAX #29, with CJK run handling
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    /// Known words used to split CJK runs
    lexicon: FxHashSet<String>,
    /// Length in chars of the longest lexicon entry
    max_word_chars: usize,
}

impl Tokenizer {
    /// Create a tokenizer without a lexicon (CJK runs stay whole)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add words used to split CJK runs by forward maximum matching
    pub fn with_lexicon<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for word in words {
            let word = word.into();
            let word = word.trim();
            if word.is_empty() {
                continue;
            }
            self.max_word_chars = self.max_word_chars.max(word.chars().count());
            self.lexicon.insert(word.to_string());
        }
        self
    }

    /// Number of lexicon entries
    pub fn lexicon_len(&self) -> usize {
        self.lexicon.len()
    }

    /// Split one contiguous CJK run.
    fn push_cjk_run<'a>(&self, run: &'a str, out: &mut Vec<&'a str>) {
        if self.lexicon.is_empty() {
            out.push(run);
            return;
        }

        let bounds: Vec<usize> = run
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(run.len()))
            .collect();
        let n_chars = bounds.len() - 1;

        let mut i = 0;
        let mut pending: Option<usize> = None;
        while i < n_chars {
            let max_len = self.max_word_chars.min(n_chars - i);
            let hit = (1..=max_len)
                .rev()
                .find(|&len| self.lexicon.contains(&run[bounds[i]..bounds[i + len]]));

            match hit {
                Some(len) => {
                    if let Some(start) = pending.take() {
                        out.push(&run[bounds[start]..bounds[i]]);
                    }
                    out.push(&run[bounds[i]..bounds[i + len]]);
                    i += len;
                }
                None => {
                    pending.get_or_insert(i);
                    i += 1;
                }
            }
        }
        if let Some(start) = pending {
            out.push(&run[bounds[start]..]);
        }
    }

    /// Check if a character is CJK
    pub fn is_cjk(c: char) -> bool {
        matches!(c,
            '\u{4E00}'..='\u{9FFF}' |   // CJK Unified Ideographs
            '\u{3400}'..='\u{4DBF}' |   // CJK Extension A
            '\u{20000}'..='\u{2A6DF}' | // CJK Extension B
            '\u{2A700}'..='\u{2B73F}' | // CJK Extension C
            '\u{2B740}'..='\u{2B81F}' | // CJK Extension D
            '\u{F900}'..='\u{FAFF}' |   // CJK Compatibility
            '\u{3040}'..='\u{309F}' |   // Hiragana
            '\u{30A0}'..='\u{30FF}' |   // Katakana
            '\u{AC00}'..='\u{D7AF}'     // Hangul
        )
    }

    fn is_cjk_segment(segment: &str) -> bool {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| Self::is_cjk(c) && c.is_alphanumeric())
    }
}

impl Segmenter for Tokenizer {
    fn segment<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut out = Vec::new();
        // Byte range of the CJK run currently being accumulated
        let mut run: Option<(usize, usize)> = None;

        for (idx, segment) in text.split_word_bound_indices() {
            if Self::is_cjk_segment(segment) {
                let end = idx + segment.len();
                run = match run {
                    Some((start, run_end)) if run_end == idx => Some((start, end)),
                    Some((start, run_end)) => {
                        self.push_cjk_run(&text[start..run_end], &mut out);
                        Some((idx, end))
                    }
                    None => Some((idx, end)),
                };
                continue;
            }

            if let Some((start, end)) = run.take() {
                self.push_cjk_run(&text[start..end], &mut out);
            }

            // Skip whitespace and pure punctuation/symbols
            if segment.chars().any(|c| c.is_alphanumeric()) {
                out.push(segment);
            }
        }

        if let Some((start, end)) = run {
            self.push_cjk_run(&text[start..end], &mut out);
        }

        out
    }
}
