//! Question bank configuration.

use crate::embeddings::EmbeddingConfig;
use aptwise_core::config::{DEFAULT_COLLECTION, DEFAULT_SIMILARITY_THRESHOLD};
use aptwise_core::{AppConfig, AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Number of nearest neighbours inspected by a duplicate check.
pub const DUPLICATE_SEARCH_K: usize = 5;

/// Settings for the vector index, the corpus and the duplicate detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Collection (table) holding the question bank
    pub collection: String,

    /// On-disk index directory; `None` keeps the index in memory
    pub index_path: Option<PathBuf>,

    /// Directory of corpus JSON files
    pub data_dir: PathBuf,

    /// Minimum cosine similarity for a hit to count as a duplicate
    pub similarity_threshold: f32,

    pub embedding: EmbeddingConfig,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            index_path: Some(PathBuf::from(".aptwise/index")),
            data_dir: PathBuf::from("data"),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl VectorConfig {
    /// Build from the application config, resolving paths against the workspace.
    pub fn from_app_config(config: &AppConfig) -> AppResult<Self> {
        let vector = Self {
            collection: config.collection.clone(),
            index_path: Some(config.resolved_index_path()),
            data_dir: config.resolved_data_dir(),
            similarity_threshold: config.similarity_threshold,
            embedding: EmbeddingConfig::from(&config.embedding),
        };
        vector.validate()?;
        Ok(vector)
    }

    /// In-memory configuration, mostly for tests.
    pub fn in_memory() -> Self {
        Self {
            index_path: None,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.collection.trim().is_empty() {
            return Err(AppError::Config("Collection name must not be empty".to_string()));
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(AppError::Config(format!(
                "Similarity threshold must be within [0.0, 1.0], got {}",
                self.similarity_threshold
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
