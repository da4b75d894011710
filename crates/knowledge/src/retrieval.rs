//! Vector Retrieval Service.
//!
//! Owns the embedding provider and the index connection. Embedding, indexing
//! and search are independent operations; the service also manages the
//! lifecycle of its single collection.
//!
//! Every operation comes in two forms. `try_*` returns the underlying
//! [`AppResult`]; the plain form logs the failure and returns a conservative
//! default (`false` for mutations, an empty list for search) so that callers
//! on a live interview path never see an infrastructure error.

use crate::config::VectorConfig;
use crate::embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
use crate::store::{InMemoryVectorStore, LanceDbStore, VectorStore};
use crate::types::{CollectionInfo, NewDocument, Point, PointPayload, SearchHit};
use aptwise_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Separator between question and answer when hashing. Unit Separator, not
/// expected in natural text.
const CONTENT_ID_SEPARATOR: char = '\u{1f}';

/// Bytes of the SHA-256 digest kept in a content id (128 bits).
const CONTENT_ID_BYTES: usize = 16;

/// File recording which embedding model an on-disk index was built with.
const INDEX_EMBEDDING_FILE: &str = "embedding.json";

/// Log indexing progress every this many documents.
const PROGRESS_EVERY: usize = 20;

/// Embedding, indexing and search over the question bank collection.
pub struct VectorRetrievalService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Option<Arc<dyn VectorStore>>,
    collection: String,
}

impl std::fmt::Debug for VectorRetrievalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorRetrievalService")
            .field("embedder", &self.embedder)
            .field("store", &self.store.as_ref().map(|s| s.backend_name().to_string()))
            .field("collection", &self.collection)
            .finish()
    }
}

impl VectorRetrievalService {
    /// Create a service over an already connected store.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store: Some(store),
            collection: collection.into(),
        }
    }

    /// Create a service whose index connection could not be established.
    ///
    /// Every index operation reports `IndexUnavailable`; embedding still works.
    pub fn unavailable(embedder: Arc<dyn EmbeddingProvider>, collection: impl Into<String>) -> Self {
        Self {
            embedder,
            store: None,
            collection: collection.into(),
        }
    }

    /// Build the embedder and connect the configured store.
    ///
    /// A store that cannot be opened is logged and leaves the service
    /// unavailable rather than failing construction. Embedder and
    /// configuration errors are returned.
    pub async fn connect(config: &VectorConfig) -> AppResult<Self> {
        config.validate()?;
        let embedder = create_provider(&config.embedding).await?;

        let Some(index_path) = &config.index_path else {
            info!("Using in-memory vector index for '{}'", config.collection);
            return Ok(Self::new(
                embedder,
                Arc::new(InMemoryVectorStore::new()),
                config.collection.clone(),
            ));
        };

        match LanceDbStore::connect(index_path).await {
            Ok(store) => {
                check_index_embedding(index_path, &config.embedding)?;
                info!(
                    "Vector retrieval service initialized with model '{}' ({} dimensions) at {:?}",
                    embedder.model_name(),
                    embedder.dimensions(),
                    index_path
                );
                Ok(Self::new(embedder, Arc::new(store), config.collection.clone()))
            }
            Err(e) => {
                error!("Failed to initialize vector index at {:?}: {}", index_path, e);
                Ok(Self::unavailable(embedder, config.collection.clone()))
            }
        }
    }

    /// Name of the collection this service manages.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Whether an index connection was established.
    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self) -> AppResult<&Arc<dyn VectorStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| AppError::IndexUnavailable("vector index not connected".to_string()))
    }

    /// Embed text with the service's model. The empty string is allowed.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        self.embedder.embed(text).await
    }

    /// Deterministic point id for a question/answer pair.
    ///
    /// The raw strings are hashed as given: SHA-256 over
    /// `question + U+001F + answer`, truncated to 128 bits, as 32 lowercase
    /// hex characters.
    pub fn content_id(question: &str, answer: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(question.as_bytes());
        let mut separator = [0u8; 4];
        hasher.update(CONTENT_ID_SEPARATOR.encode_utf8(&mut separator).as_bytes());
        hasher.update(answer.as_bytes());
        let digest = hasher.finalize();

        digest[..CONTENT_ID_BYTES]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// Create the collection if it is absent. Idempotent.
    pub async fn try_ensure_collection(&self) -> AppResult<()> {
        let store = self.store()?;

        if store.collection_exists(&self.collection).await? {
            debug!("Collection '{}' already exists", self.collection);
            return Ok(());
        }

        store
            .create_collection(&self.collection, self.embedder.dimensions())
            .await?;
        info!(
            "Created collection '{}' ({} dimensions, cosine)",
            self.collection,
            self.embedder.dimensions()
        );
        Ok(())
    }

    pub async fn ensure_collection(&self) -> bool {
        match self.try_ensure_collection().await {
            Ok(()) => true,
            Err(e) => {
                error!("Error creating collection '{}': {}", self.collection, e);
                false
            }
        }
    }

    /// Destroy and recreate the collection empty.
    pub async fn try_clear_collection(&self) -> AppResult<()> {
        let store = self.store()?;

        info!("Clearing collection '{}'", self.collection);
        store.delete_collection(&self.collection).await?;
        store
            .create_collection(&self.collection, self.embedder.dimensions())
            .await?;
        Ok(())
    }

    pub async fn clear_collection(&self) -> bool {
        match self.try_clear_collection().await {
            Ok(()) => true,
            Err(e) => {
                error!("Error clearing collection '{}': {}", self.collection, e);
                false
            }
        }
    }

    /// Whether the collection holds at least one point. An unknown count is zero.
    pub async fn try_has_data(&self) -> AppResult<bool> {
        let count = self.store()?.count(&self.collection).await?.unwrap_or(0);

        if count > 0 {
            info!("Collection '{}' has {} documents", self.collection, count);
        } else {
            info!("Collection '{}' is missing or empty", self.collection);
        }
        Ok(count > 0)
    }

    pub async fn has_data(&self) -> bool {
        match self.try_has_data().await {
            Ok(has_data) => has_data,
            Err(e) => {
                error!("Error checking collection '{}': {}", self.collection, e);
                false
            }
        }
    }

    /// Embed and upsert a batch of documents in one call.
    ///
    /// Questions and answers are trimmed. Documents with an empty question
    /// are skipped, as are repeats of a content id already seen in this batch
    /// (the first occurrence wins). Returns the number of points written, or
    /// `InvalidInput` when nothing valid remains.
    #[instrument(skip(self, documents), fields(documents = documents.len()))]
    pub async fn try_index_documents(&self, documents: &[NewDocument]) -> AppResult<usize> {
        let store = self.store()?;

        let mut seen_ids = HashSet::new();
        let mut pending = Vec::new();

        for (i, doc) in documents.iter().enumerate() {
            let question = doc.question.trim();
            let answer = doc.answer.trim();

            if question.is_empty() {
                warn!("Empty question at index {}, skipping", i);
                continue;
            }

            let id = Self::content_id(question, answer);
            if !seen_ids.insert(id.clone()) {
                debug!("Duplicate document at index {}, skipping", i);
                continue;
            }

            pending.push((
                id,
                PointPayload {
                    question: question.to_string(),
                    answer: answer.to_string(),
                    source_index: i as u64,
                    source: doc.source.clone(),
                    metadata: doc.metadata.clone(),
                },
            ));

            if (i + 1) % PROGRESS_EVERY == 0 {
                debug!("Prepared {}/{} documents", i + 1, documents.len());
            }
        }

        if pending.is_empty() {
            return Err(AppError::InvalidInput("no valid documents to index".to_string()));
        }

        let questions: Vec<String> = pending.iter().map(|(_, p)| p.question.clone()).collect();
        let vectors = self.embedder.embed_batch(&questions).await?;
        if vectors.len() != pending.len() {
            return Err(AppError::Embedding(format!(
                "Expected {} embeddings, got {}",
                pending.len(),
                vectors.len()
            )));
        }

        let points: Vec<Point> = pending
            .into_iter()
            .zip(vectors)
            .map(|((id, payload), vector)| Point {
                id,
                vector,
                payload,
            })
            .collect();

        self.try_ensure_collection().await?;
        store.upsert(&self.collection, &points).await?;

        info!("Indexed {} unique documents in '{}'", points.len(), self.collection);
        Ok(points.len())
    }

    pub async fn index_documents(&self, documents: &[NewDocument]) -> bool {
        match self.try_index_documents(documents).await {
            Ok(_) => true,
            Err(AppError::InvalidInput(reason)) => {
                warn!("Nothing indexed: {}", reason);
                false
            }
            Err(e) => {
                error!("Error indexing documents: {}", e);
                false
            }
        }
    }

    /// Up to `k` nearest questions, most similar first, ranked from 1.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn try_search(&self, query: &str, k: usize) -> AppResult<Vec<SearchHit>> {
        let store = self.store()?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query).await?;
        let scored = store.search(&self.collection, &vector, k).await?;

        let hits: Vec<SearchHit> = scored
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(i, point)| SearchHit {
                id: point.id,
                question: point.payload.question,
                answer: point.payload.answer,
                similarity: point.score,
                rank: i + 1,
            })
            .collect();

        debug!("Found {} similar questions", hits.len());
        Ok(hits)
    }

    pub async fn search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        match self.try_search(query, k).await {
            Ok(hits) => hits,
            Err(e) => {
                error!("Error during search: {}", e);
                Vec::new()
            }
        }
    }

    /// Snapshot of the collection for status output.
    pub async fn collection_info(&self) -> CollectionInfo {
        let mut info = CollectionInfo {
            name: self.collection.clone(),
            status: "active".to_string(),
            points_count: 0,
            embedding_dimension: self.embedder.dimensions(),
            model: self.embedder.model_name().to_string(),
            error: None,
        };

        let count = match self.store() {
            Ok(store) => store.count(&self.collection).await,
            Err(e) => {
                info.status = "unavailable".to_string();
                info.error = Some(e.to_string());
                return info;
            }
        };

        match count {
            Ok(Some(points)) => info.points_count = points,
            Ok(None) => {
                info.status = "error".to_string();
                info.error = Some(format!("collection '{}' does not exist", self.collection));
            }
            Err(e) => {
                error!("Error getting collection info: {}", e);
                info.status = "error".to_string();
                info.error = Some(e.to_string());
            }
        }

        info
    }
}

/// Record the embedding model next to an on-disk index, or check that the
/// configured model matches the one the index was built with.
fn check_index_embedding(index_path: &Path, config: &EmbeddingConfig) -> AppResult<()> {
    let marker = index_path.join(INDEX_EMBEDDING_FILE);

    if marker.exists() {
        let recorded: EmbeddingConfig = serde_json::from_str(&std::fs::read_to_string(&marker)?)?;
        return recorded.validate_consistency(config).map_err(|e| {
            AppError::Config(format!(
                "{} ({:?} was built with another embedding model; reindex with --force after removing it)",
                e, index_path
            ))
        });
    }

    std::fs::write(&marker, serde_json::to_string_pretty(config)?)?;
    Ok(())
}
