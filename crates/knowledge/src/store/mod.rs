//! Vector index abstraction for the question bank.
//!
//! A store holds named collections of [`Point`]s with a fixed vector size and
//! answers k-nearest-neighbour queries by cosine similarity.

pub mod lancedb;
pub mod memory;

pub use self::lancedb::LanceDbStore;
pub use self::memory::InMemoryVectorStore;

use crate::types::{Point, ScoredPoint};
use aptwise_core::AppResult;
use async_trait::async_trait;

/// Trait for vector index backends.
///
/// Infrastructure failures are reported as `AppError::IndexUnavailable`;
/// points whose vector size does not match the collection are rejected with
/// `AppError::InvalidInput`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name for logs and status output.
    fn backend_name(&self) -> &str;

    /// Whether the named collection exists.
    async fn collection_exists(&self, name: &str) -> AppResult<bool>;

    /// Create a collection with the given vector size. No-op if it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> AppResult<()>;

    /// Remove every point in a collection. Backends may keep the empty
    /// collection itself. No-op if it does not exist.
    async fn delete_collection(&self, name: &str) -> AppResult<()>;

    /// Number of points in the collection, `None` if the backend cannot tell
    /// (including a missing collection).
    async fn count(&self, name: &str) -> AppResult<Option<u64>>;

    /// Insert points, overwriting any existing point with the same id.
    async fn upsert(&self, name: &str, points: &[Point]) -> AppResult<()>;

    /// Return up to `top_k` points ordered by descending cosine similarity.
    async fn search(&self, name: &str, vector: &[f32], top_k: usize) -> AppResult<Vec<ScoredPoint>>;
}

/// Calculate cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Sort by descending score (ties broken by id) and keep the first `top_k`.
pub(crate) fn rank_points(mut scored: Vec<ScoredPoint>, top_k: usize) -> Vec<ScoredPoint> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PointPayload;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_rank_points_orders_and_truncates() {
        let point = |id: &str, score: f32| ScoredPoint {
            id: id.to_string(),
            score,
            payload: PointPayload::default(),
        };

        let ranked = rank_points(
            vec![point("b", 0.2), point("c", 0.9), point("a", 0.9), point("d", 0.5)],
            3,
        );

        let ids: Vec<&str> = ranked.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "d"]);
    }
}
