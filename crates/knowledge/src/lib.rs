//! AptWise question bank.
//!
//! Semantic retrieval and duplicate detection over a bank of interview
//! question/answer pairs:
//! - [`embeddings`]: text to vector providers (offline trigram, Ollama)
//! - [`store`]: vector index backends (in-memory, LanceDB)
//! - [`retrieval`]: embedding, content-addressed indexing and k-NN search
//! - [`corpus`]: bulk loading from JSON files
//! - [`dedup`]: the check-and-store decision for generated questions

pub mod config;
pub mod corpus;
pub mod dedup;
pub mod embeddings;
pub mod retrieval;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::{VectorConfig, DUPLICATE_SEARCH_K};
pub use corpus::{CorpusLoader, LoadReport};
pub use dedup::{
    normalize_question, summarize, ActionTaken, BatchItem, BatchSummary, CheckResult, DedupStats,
    QuestionDeduplicationService,
};
pub use embeddings::{EmbeddingConfig, EmbeddingProvider};
pub use retrieval::VectorRetrievalService;
pub use store::{InMemoryVectorStore, LanceDbStore, VectorStore};
pub use types::{
    CollectionInfo, NewDocument, Point, PointPayload, QuestionMetadata, ScoredPoint, SearchHit,
};
