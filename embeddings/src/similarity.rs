//! Similarity computation for embeddings.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors (or a zero vector on either side)
/// - -1.0 means opposite vectors
///
/// Sums are accumulated in `f64` so long vectors do not lose precision.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    Ok(score.clamp(-1.0, 1.0) as f32)
}

/// A similarity search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// ID of the matched item.
    pub id: String,

    /// Similarity score.
    pub score: f32,
}

impl SimilarityResult {
    /// Create a new similarity result.
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Every candidate scoring at least `min_score` against `query`, best first.
///
/// A candidate whose dimension differs from the query is skipped with a
/// warning instead of failing the whole pass.
pub fn similar_at_least<'a, I>(query: &[f32], candidates: I, min_score: f32) -> Vec<SimilarityResult>
where
    I: IntoIterator<Item = (&'a str, &'a [f32])>,
{
    let mut scores: Vec<(OrderedFloat<f32>, &str)> = Vec::new();

    for (id, embedding) in candidates {
        match cosine_similarity(query, embedding) {
            Ok(score) if score >= min_score => scores.push((OrderedFloat(score), id)),
            Ok(_) => {}
            Err(e) => warn!(candidate = id, "Skipping similarity comparison: {e}"),
        }
    }

    // Stable, so equal scores keep candidate order.
    scores.sort_by_key(|(score, _)| Reverse(*score));

    scores
        .into_iter()
        .map(|(score, id)| SimilarityResult::new(id, score.0))
        .collect()
}
