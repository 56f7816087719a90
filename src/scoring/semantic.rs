//! Semantic similarity layer
//!
//! Embedding vectors are produced elsewhere; this module only turns a pair
//! of them into a 0–100 score for composite scoring.

use crate::errors::{Result, ScoringError};

/// Cosine similarity of two equal-length, non-zero vectors.
///
/// Accumulates in `f64` for stability.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(ScoringError::input(format!(
            "embedding dimensions differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    if a.is_empty() {
        return Err(ScoringError::input("embeddings are empty"));
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if !(dot.is_finite() && norm_a.is_finite() && norm_b.is_finite()) {
        return Err(ScoringError::input("embeddings contain non-finite values"));
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(ScoringError::input("cosine similarity of a zero vector is undefined"));
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Cosine similarity scaled to [0, 100]; negative similarity scores 0.
pub fn similarity_score(a: &[f32], b: &[f32]) -> Result<f64> {
    Ok((cosine_similarity(a, b)? * 100.0).clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors() {
        let v = [0.2, 0.5, 0.1];
        assert!((cosine_similarity(&v, &v).unwrap() - 1.0).abs() < 1e-9);
        assert!((similarity_score(&v, &v).unwrap() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_and_opposite() {
        assert_eq!(similarity_score(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0);
        assert_eq!(similarity_score(&[1.0, 0.0], &[-1.0, 0.0]).unwrap(), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = cosine_similarity(&[1.0, 0.0], &[1.0]).unwrap_err();
        assert!(err.is_input());
    }

    #[test]
    fn test_zero_vector() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_err());
        assert!(cosine_similarity(&[], &[]).is_err());
    }
}
