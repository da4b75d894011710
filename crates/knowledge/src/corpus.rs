//! Corpus Loader.
//!
//! Seeds the question bank from a directory of JSON files. A file holds a
//! list of documents, an object with a `questions` list, or one document.

use crate::retrieval::VectorRetrievalService;
use crate::types::NewDocument;
use aptwise_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use walkdir::WalkDir;

#[derive(Deserialize)]
#[serde(untagged)]
enum CorpusFile {
    List(Vec<NewDocument>),
    Wrapped { questions: Vec<NewDocument> },
    Single(NewDocument),
}

/// What a bulk load did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Corpus files read
    pub files: usize,
    /// Documents across all files
    pub documents: usize,
    /// Documents left after cross-file de-duplication
    pub unique: usize,
    /// Documents dropped as exact repeats
    pub duplicates_removed: usize,
    /// Points written to the index
    pub indexed: usize,
    /// True when the load was skipped because the collection already had data
    pub skipped_existing: bool,
}

/// Parse one corpus file.
pub fn try_load_file(path: &Path) -> AppResult<Vec<NewDocument>> {
    let content = std::fs::read_to_string(path)?;
    let parsed: CorpusFile = serde_json::from_str(&content)
        .map_err(|e| AppError::Parse(format!("{}: {}", path.display(), e)))?;

    Ok(match parsed {
        CorpusFile::List(documents) => documents,
        CorpusFile::Wrapped { questions } => questions,
        CorpusFile::Single(document) => vec![document],
    })
}

/// Parse one corpus file; unreadable or malformed files yield no documents.
pub fn load_file(path: &Path) -> Vec<NewDocument> {
    match try_load_file(path) {
        Ok(documents) => documents,
        Err(e) => {
            error!("Error loading data from {:?}: {}", path, e);
            Vec::new()
        }
    }
}

/// Drop repeats of the same trimmed `(question, answer)` pair, keeping the first.
fn dedupe_documents(documents: Vec<NewDocument>) -> Vec<NewDocument> {
    let mut seen = HashSet::new();
    documents
        .into_iter()
        .filter(|doc| seen.insert((doc.question.trim().to_string(), doc.answer.trim().to_string())))
        .collect()
}

/// Loads corpus directories into the question bank.
#[derive(Debug, Clone)]
pub struct CorpusLoader {
    retrieval: Arc<VectorRetrievalService>,
}

impl CorpusLoader {
    pub fn new(retrieval: Arc<VectorRetrievalService>) -> Self {
        Self { retrieval }
    }

    /// Index every `*.json` file directly inside `dir`.
    ///
    /// Without `force_reload`, a collection that already has data is left
    /// alone. With it, the collection is cleared first; a failed clear is
    /// logged and loading continues.
    #[instrument(skip(self, dir), fields(dir = %dir.display()))]
    pub async fn try_load_all(&self, dir: &Path, force_reload: bool) -> AppResult<LoadReport> {
        if !dir.is_dir() {
            return Err(AppError::Config(format!(
                "Data directory {:?} does not exist",
                dir
            )));
        }

        if !force_reload && self.retrieval.try_has_data().await? {
            info!("Collection already has data, skipping initialization");
            return Ok(LoadReport {
                skipped_existing: true,
                ..Default::default()
            });
        }

        self.retrieval.try_ensure_collection().await?;

        if force_reload {
            info!("Clearing existing data for fresh reload");
            if let Err(e) = self.retrieval.try_clear_collection().await {
                warn!("Failed to clear collection, continuing anyway: {}", e);
            }
        }

        let mut report = LoadReport::default();
        let mut all_documents = Vec::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            if !entry.file_type().is_file() || !is_json {
                continue;
            }

            info!("Loading file: {:?}", entry.file_name());
            report.files += 1;

            let documents = load_file(path);
            if documents.is_empty() {
                warn!("No documents found in {:?}", entry.file_name());
            } else {
                info!("Loaded {} documents from {:?}", documents.len(), entry.file_name());
                all_documents.extend(documents);
            }
        }

        if all_documents.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "no documents found in {:?}",
                dir
            )));
        }

        report.documents = all_documents.len();
        let unique = dedupe_documents(all_documents);
        report.unique = unique.len();
        report.duplicates_removed = report.documents - report.unique;

        info!(
            "Found {} unique documents (removed {} duplicates)",
            report.unique, report.duplicates_removed
        );

        report.indexed = self.retrieval.try_index_documents(&unique).await?;
        Ok(report)
    }

    pub async fn load_all(&self, dir: &Path, force_reload: bool) -> bool {
        match self.try_load_all(dir, force_reload).await {
            Ok(_) => true,
            Err(e) => {
                error!("Error loading data files: {}", e);
                false
            }
        }
    }

    /// Load the corpus only when the collection is missing or empty.
    pub async fn ensure_loaded(&self, dir: &Path) -> bool {
        if self.retrieval.has_data().await {
            info!("Collection is ready, no initialization needed");
            return true;
        }

        info!("Initializing collection with data");
        let loaded = self.load_all(dir, false).await;
        if loaded {
            info!("Collection initialized successfully");
        } else {
            error!("Failed to initialize collection");
        }
        loaded
    }

    /// Clear the collection and index the corpus again.
    pub async fn force_reindex(&self, dir: &Path) -> bool {
        info!("Force re-indexing question bank");
        self.load_all(dir, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_file_accepts_all_shapes() {
        let dir = TempDir::new().unwrap();

        let list = write(
            dir.path(),
            "list.json",
            r#"[{"question": "What is a list?", "answer": "A mutable sequence."}]"#,
        );
        let wrapped = write(
            dir.path(),
            "wrapped.json",
            r#"{"questions": [{"question": "Q1", "answer": "A1"}, {"question": "Q2"}]}"#,
        );
        let single = write(
            dir.path(),
            "single.json",
            r#"{"question": "What is GIL?", "answer": "Global interpreter lock."}"#,
        );

        assert_eq!(load_file(&list).len(), 1);
        let wrapped_docs = load_file(&wrapped);
        assert_eq!(wrapped_docs.len(), 2);
        assert_eq!(wrapped_docs[1].answer, "");
        assert_eq!(load_file(&single)[0].question, "What is GIL?");
    }

    #[test]
    fn test_load_file_malformed_returns_empty() {
        let dir = TempDir::new().unwrap();
        let broken = write(dir.path(), "broken.json", "[{\"question\": ");

        assert!(load_file(&broken).is_empty());
        assert!(matches!(try_load_file(&broken), Err(AppError::Parse(_))));
        assert!(load_file(&dir.path().join("missing.json")).is_empty());
    }

    #[test]
    fn test_dedupe_documents_compares_trimmed_pairs() {
        let docs = vec![
            NewDocument::new("What is a tuple?", "Immutable."),
            NewDocument::new("  What is a tuple?  ", "Immutable. "),
            NewDocument::new("What is a tuple?", "An immutable sequence."),
        ];

        let unique = dedupe_documents(docs);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[1].answer, "An immutable sequence.");
    }
}
