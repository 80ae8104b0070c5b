//! Similarity computation for embeddings.

use ordered_float::OrderedFloat;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical vectors
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}

/// Scan `candidates` for the entry most similar to `query`.
///
/// The scan keeps the first strict maximum, so when two candidates tie at
/// the top score the earlier one in iteration order wins. Callers supply
/// candidates in a stable order to make repeated scans reproducible.
/// An empty candidate list yields `None`.
pub fn find_best_match(
    query: &[f32],
    candidates: &[(String, Embedding)],
) -> Result<Option<(String, f32)>> {
    let mut best: Option<(usize, OrderedFloat<f32>)> = None;

    for (idx, (_, embedding)) in candidates.iter().enumerate() {
        let score = OrderedFloat(cosine_similarity(query, embedding)?);
        let replace = match best {
            None => true,
            Some((_, top)) => score > top,
        };
        if replace {
            best = Some((idx, score));
        }
    }

    Ok(best.map(|(idx, score)| (candidates[idx].0.clone(), score.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_zero_magnitude_is_zero_similarity() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!(cosine_similarity(&a, &b).is_err());
    }

    #[test]
    fn test_find_best_match_empty_pool() {
        let query = vec![1.0, 0.0];
        assert_eq!(find_best_match(&query, &[]).unwrap(), None);
    }

    #[test]
    fn test_find_best_match_picks_highest() {
        let query = vec![1.0, 0.0, 0.0];
        let candidates = vec![
            ("far".to_string(), vec![0.0, 1.0, 0.0]),
            ("close".to_string(), vec![0.9, 0.1, 0.0]),
            ("exact".to_string(), vec![2.0, 0.0, 0.0]),
        ];

        let (id, score) = find_best_match(&query, &candidates).unwrap().unwrap();
        assert_eq!(id, "exact");
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_find_best_match_tie_keeps_first() {
        // Both candidates are the same direction as the query; the earlier
        // one must win regardless of magnitude.
        let query = vec![3.0, 4.0];
        let candidates = vec![
            ("first".to_string(), vec![3.0, 4.0]),
            ("second".to_string(), vec![6.0, 8.0]),
        ];

        let (id, _) = find_best_match(&query, &candidates).unwrap().unwrap();
        assert_eq!(id, "first");
    }

    #[test]
    fn test_find_best_match_propagates_dimension_mismatch() {
        let query = vec![1.0, 0.0];
        let candidates = vec![("bad".to_string(), vec![1.0, 0.0, 0.0])];
        assert!(find_best_match(&query, &candidates).is_err());
    }
}
