//! Similarity computation for embeddings.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors, or either vector is all zeros
/// - -1.0 means opposite vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a = magnitude(a);
    let magnitude_b = magnitude(b);

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}

fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Position of a candidate together with its similarity to a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredIndex {
    /// Index into the candidate slice.
    pub index: usize,

    /// Cosine similarity to the query.
    pub score: f32,
}

/// Scan `candidates` once and return the most similar one.
///
/// The first candidate reaching the maximum score wins ties. Returns `None`
/// when there are no candidates.
pub fn best_match<E>(query: &[f32], candidates: &[E]) -> Result<Option<ScoredIndex>>
where
    E: AsRef<[f32]>,
{
    let mut best: Option<ScoredIndex> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        let score = cosine_similarity(query, candidate.as_ref())?;
        // NaN never displaces a real score
        let better = match best {
            None => true,
            Some(current) => {
                score > current.score || (current.score.is_nan() && !score.is_nan())
            }
        };
        if better {
            best = Some(ScoredIndex { index, score });
        }
    }

    Ok(best)
}

/// Find the `k` most similar candidates, best first.
///
/// Candidates with equal scores keep their original order.
pub fn top_k<E>(query: &[f32], candidates: &[E], k: usize) -> Result<Vec<ScoredIndex>>
where
    E: AsRef<[f32]>,
{
    let mut scores = Vec::with_capacity(candidates.len());
    for (index, candidate) in candidates.iter().enumerate() {
        let score = cosine_similarity(query, candidate.as_ref())?;
        scores.push(ScoredIndex { index, score });
    }

    // stable sort
    scores.sort_by_key(|s| Reverse(OrderedFloat(s.score)));
    scores.truncate(k);

    Ok(scores)
}

/// Normalize an embedding to unit length.
pub fn normalize(embedding: &mut Embedding) {
    let magnitude = magnitude(embedding);
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x /= magnitude;
        }
    }
}

/// The all-zeros vector of length `dimension`.
///
/// Stands in for a sentence whose embedding could not be computed; it scores
/// 0 against every query.
pub fn zero_embedding(dimension: usize) -> Embedding {
    vec![0.0; dimension]
}

/// Whether every component of `embedding` is zero.
pub fn is_zero(embedding: &[f32]) -> bool {
    embedding.iter().all(|x| *x == 0.0)
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
    fn test_cosine_similarity_is_symmetric() {
        let pairs = [
            (vec![0.3, -1.2, 4.0], vec![2.0, 0.5, -0.7]),
            (vec![1.0, 1.0, 1.0], vec![0.0, 2.0, 9.0]),
            (vec![-5.0, 0.1, 0.0], vec![-4.0, 0.3, 0.2]),
        ];
        for (a, b) in pairs {
            assert_eq!(
                cosine_similarity(&a, &b).unwrap(),
                cosine_similarity(&b, &a).unwrap()
            );
        }
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let zero = zero_embedding(3);
        let a = vec![0.2, 0.4, 0.9];
        assert_eq!(cosine_similarity(&zero, &a).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&a, &zero).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!(cosine_similarity(&a, &b).is_err());
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_best_match_first_wins_on_ties() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            vec![0.0, 1.0],
            vec![2.0, 0.0],
            vec![5.0, 0.0],
            vec![0.5, 0.5],
        ];

        let best = best_match(&query, &candidates).unwrap().unwrap();
        assert_eq!(best.index, 1);
        assert!((best.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_best_match_empty() {
        let candidates: Vec<Embedding> = Vec::new();
        assert_eq!(best_match(&[1.0, 0.0], &candidates).unwrap(), None);
    }

    #[test]
    fn test_best_match_all_zero_candidates() {
        let candidates = vec![zero_embedding(2), zero_embedding(2)];
        let best = best_match(&[1.0, 0.0], &candidates).unwrap().unwrap();
        assert_eq!(best, ScoredIndex { index: 0, score: 0.0 });
    }

    #[test]
    fn test_top_k() {
        let query = vec![1.0, 0.0, 0.0];
        let candidates = vec![
            vec![1.0, 0.0, 0.0], // similarity 1.0
            vec![0.0, 1.0, 0.0], // similarity 0.0
            vec![0.7, 0.7, 0.0], // similarity ~0.7
        ];

        let results = top_k(&query, &candidates, 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].index, 0);
        assert_eq!(results[1].index, 2);
    }

    #[test]
    fn test_top_k_keeps_insertion_order_on_ties() {
        let query = vec![0.0, 1.0];
        let candidates = vec![vec![1.0, 0.0], vec![0.0, 3.0], vec![0.0, 1.0]];

        let indices: Vec<usize> = top_k(&query, &candidates, 3)
            .unwrap()
            .into_iter()
            .map(|s| s.index)
            .collect();
        assert_eq!(indices, vec![1, 2, 0]);
    }

    #[test]
    fn test_is_zero() {
        assert!(is_zero(&zero_embedding(4)));
        assert!(!is_zero(&[0.0, 0.1]));
    }
}
