//! Keyword extraction from reference vocabulary text

pub mod extraction;

pub use extraction::{scan_tokens, strip_enumeration_markers, KeywordExtractor, ScannedToken};
