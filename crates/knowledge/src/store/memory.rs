//! In-memory vector store using exact cosine similarity.
//!
//! Backed by a `HashMap` behind a `tokio::sync::RwLock`. Suitable for tests,
//! development and ephemeral deployments; nothing survives the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{cosine_similarity, rank_points, VectorStore};
use crate::types::{Point, ScoredPoint};
use aptwise_core::{AppError, AppResult};

#[derive(Debug)]
struct Collection {
    dimensions: usize,
    points: HashMap<String, Point>,
}

/// An in-memory vector store.
///
/// Collections are stored as collection name → point id → point.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(name: &str) -> AppError {
    AppError::IndexUnavailable(format!("collection '{}' does not exist", name))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn collection_exists(&self, name: &str) -> AppResult<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> AppResult<()> {
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_insert_with(|| Collection {
            dimensions,
            points: HashMap::new(),
        });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> AppResult<()> {
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn count(&self, name: &str) -> AppResult<Option<u64>> {
        let collections = self.collections.read().await;
        Ok(collections.get(name).map(|c| c.points.len() as u64))
    }

    async fn upsert(&self, name: &str, points: &[Point]) -> AppResult<()> {
        let mut collections = self.collections.write().await;
        let collection = collections.get_mut(name).ok_or_else(|| missing(name))?;

        if let Some(bad) = points.iter().find(|p| p.vector.len() != collection.dimensions) {
            return Err(AppError::InvalidInput(format!(
                "point '{}' has {} dimensions, collection '{}' expects {}",
                bad.id,
                bad.vector.len(),
                name,
                collection.dimensions
            )));
        }

        for point in points {
            collection.points.insert(point.id.clone(), point.clone());
        }
        Ok(())
    }

    async fn search(&self, name: &str, vector: &[f32], top_k: usize) -> AppResult<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let collection = collections.get(name).ok_or_else(|| missing(name))?;

        let scored = collection
            .points
            .values()
            .map(|point| ScoredPoint {
                id: point.id.clone(),
                score: cosine_similarity(&point.vector, vector),
                payload: point.payload.clone(),
            })
            .collect();

        Ok(rank_points(scored, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PointPayload;

    fn point(id: &str, question: &str, vector: Vec<f32>) -> Point {
        Point {
            id: id.to_string(),
            vector,
            payload: PointPayload {
                question: question.to_string(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_create_is_idempotent_and_keeps_points() {
        let store = InMemoryVectorStore::new();
        store.create_collection("bank", 2).await.unwrap();
        store.upsert("bank", &[point("p1", "q", vec![1.0, 0.0])]).await.unwrap();

        store.create_collection("bank", 2).await.unwrap();
        assert_eq!(store.count("bank").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_id() {
        let store = InMemoryVectorStore::new();
        store.create_collection("bank", 2).await.unwrap();

        store.upsert("bank", &[point("p1", "old", vec![1.0, 0.0])]).await.unwrap();
        store.upsert("bank", &[point("p1", "new", vec![0.0, 1.0])]).await.unwrap();

        assert_eq!(store.count("bank").await.unwrap(), Some(1));
        let hits = store.search("bank", &[0.0, 1.0], 5).await.unwrap();
        assert_eq!(hits[0].payload.question, "new");
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = InMemoryVectorStore::new();
        store.create_collection("bank", 2).await.unwrap();
        store
            .upsert(
                "bank",
                &[
                    point("far", "far", vec![0.0, 1.0]),
                    point("near", "near", vec![1.0, 0.1]),
                    point("mid", "mid", vec![1.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("bank", &[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_missing_collection_and_dimension_mismatch() {
        let store = InMemoryVectorStore::new();
        assert_eq!(store.count("bank").await.unwrap(), None);
        assert!(matches!(
            store.search("bank", &[1.0], 1).await,
            Err(AppError::IndexUnavailable(_))
        ));

        store.create_collection("bank", 3).await.unwrap();
        let result = store.upsert("bank", &[point("p1", "q", vec![1.0, 0.0])]).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_delete_collection() {
        let store = InMemoryVectorStore::new();
        store.create_collection("bank", 2).await.unwrap();
        store.delete_collection("bank").await.unwrap();
        assert!(!store.collection_exists("bank").await.unwrap());
        store.delete_collection("bank").await.unwrap();
    }
}
