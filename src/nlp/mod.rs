//! Text processing building blocks
//!
//! - [`tokenizer`]: the [`Segmenter`](tokenizer::Segmenter) capability and a
//!   Unicode-aware default implementation
//! - [`normalize`]: full-width / half-width folding used before matching
//! - [`terms`]: protected terms and synonym groups

pub mod normalize;
pub mod terms;
pub mod tokenizer;
