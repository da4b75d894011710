//! Test doubles shared by the scenario tests.

use crate::embeddings::providers::trigram::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use crate::retrieval::VectorRetrievalService;
use crate::store::{InMemoryVectorStore, VectorStore};
use crate::types::{Point, ScoredPoint};
use aptwise_core::{AppError, AppResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub const COLLECTION: &str = "python_questions";

/// Embedder that returns fixed vectors for known texts and a fallback otherwise.
#[derive(Debug)]
pub struct ScriptedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
}

impl ScriptedEmbedder {
    pub fn new(fallback: Vec<f32>) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback,
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.fallback.len(), "scripted vector size");
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    fn dimensions(&self) -> usize {
        self.fallback.len()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| self.vectors.get(t).unwrap_or(&self.fallback).clone())
            .collect())
    }
}

/// Store whose every call fails as an unreachable index would.
#[derive(Debug, Default)]
pub struct UnreachableStore;

fn down() -> AppError {
    AppError::IndexUnavailable("connection refused".to_string())
}

#[async_trait]
impl VectorStore for UnreachableStore {
    fn backend_name(&self) -> &str {
        "unreachable"
    }

    async fn collection_exists(&self, _name: &str) -> AppResult<bool> {
        Err(down())
    }

    async fn create_collection(&self, _name: &str, _dimensions: usize) -> AppResult<()> {
        Err(down())
    }

    async fn delete_collection(&self, _name: &str) -> AppResult<()> {
        Err(down())
    }

    async fn count(&self, _name: &str) -> AppResult<Option<u64>> {
        Err(down())
    }

    async fn upsert(&self, _name: &str, _points: &[Point]) -> AppResult<()> {
        Err(down())
    }

    async fn search(&self, _name: &str, _vector: &[f32], _top_k: usize) -> AppResult<Vec<ScoredPoint>> {
        Err(down())
    }
}

/// Helper to build a service over a fresh in-memory store, returning the store too.
pub fn memory_service(
    embedder: Arc<dyn EmbeddingProvider>,
) -> (Arc<VectorRetrievalService>, Arc<InMemoryVectorStore>) {
    let store = Arc::new(InMemoryVectorStore::new());
    let service = VectorRetrievalService::new(embedder, store.clone(), COLLECTION);
    (Arc::new(service), store)
}

/// Helper to build a trigram-embedding service over a fresh in-memory store.
pub fn trigram_service() -> Arc<VectorRetrievalService> {
    memory_service(Arc::new(TrigramProvider::new(384))).0
}

/// Number of points in the test collection, 0 when it does not exist.
pub async fn point_count(store: &InMemoryVectorStore) -> u64 {
    store.count(COLLECTION).await.unwrap().unwrap_or(0)
}
