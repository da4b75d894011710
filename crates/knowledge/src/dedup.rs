//! Question Deduplication Service.
//!
//! Decides whether a newly generated interview question duplicates something
//! already in the bank, and stores it when it does not (or when forced).
//!
//! A candidate is a duplicate when one of its [`DUPLICATE_SEARCH_K`] nearest
//! neighbours scores at or above the similarity threshold, or, failing that,
//! when one of those same neighbours has the same normalized text. The
//! exact-text fallback only sees those neighbours: an identical question
//! ranked below them is not detected and is stored again.

use crate::config::DUPLICATE_SEARCH_K;
use crate::retrieval::VectorRetrievalService;
use crate::types::{NewDocument, QuestionMetadata, SearchHit, LLM_GENERATED_SOURCE};
use aptwise_core::config::DEFAULT_SIMILARITY_THRESHOLD;
use aptwise_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Outcome category of a check-and-store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTaken {
    StoredNewQuestion,
    StoredDespiteSimilarity,
    SkippedSimilarExists,
    StorageFailed,
    Error,
}

impl ActionTaken {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionTaken::StoredNewQuestion => "stored_new_question",
            ActionTaken::StoredDespiteSimilarity => "stored_despite_similarity",
            ActionTaken::SkippedSimilarExists => "skipped_similar_exists",
            ActionTaken::StorageFailed => "storage_failed",
            ActionTaken::Error => "error",
        }
    }
}

impl std::fmt::Display for ActionTaken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result record of [`QuestionDeduplicationService::check_and_store`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// The question as submitted
    pub question: String,
    /// Whether a matching question was found
    pub exists: bool,
    /// Whether the question was written to the index
    pub stored: bool,
    /// Text of the matched question
    pub similar_question: Option<String>,
    /// Similarity of the match, 0.0 when there is none
    pub similarity_score: f32,
    pub action_taken: ActionTaken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Position in the input of a batch call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_index: Option<usize>,
}

impl CheckResult {
    fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            exists: false,
            stored: false,
            similar_question: None,
            similarity_score: 0.0,
            action_taken: ActionTaken::Error,
            error: None,
            batch_index: None,
        }
    }

    fn failed(question: &str, error: &AppError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(question)
        }
    }
}

/// One entry of a batch check: `{question, answer, metadata}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub metadata: QuestionMetadata,
}

/// Counts over a batch of check results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub stored: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: usize,
}

/// Tally the outcomes of a batch.
pub fn summarize(results: &[CheckResult]) -> BatchSummary {
    results.iter().fold(
        BatchSummary {
            total: results.len(),
            ..Default::default()
        },
        |mut summary, result| {
            if result.stored {
                summary.stored += 1;
            }
            match result.action_taken {
                ActionTaken::SkippedSimilarExists => summary.skipped += 1,
                ActionTaken::StorageFailed => summary.failed += 1,
                ActionTaken::Error => summary.errors += 1,
                ActionTaken::StoredNewQuestion | ActionTaken::StoredDespiteSimilarity => {}
            }
            summary
        },
    )
}

/// Service status for operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupStats {
    pub similarity_threshold: f32,
    pub index_connected: bool,
    pub collection: String,
}

/// Lowercase, trim, drop trailing `?`, `.` and `!`, trim again.
///
/// Used only for the exact-text fallback, never for embedding or hashing.
pub fn normalize_question(question: &str) -> String {
    question
        .trim()
        .to_lowercase()
        .trim_end_matches(['?', '.', '!'])
        .trim()
        .to_string()
}

/// Apply the duplicate decision rule to search hits, in order.
///
/// First hit with `similarity >= threshold` wins; otherwise the first hit
/// whose normalized question equals the candidate's.
pub fn find_duplicate<'a>(question: &str, hits: &'a [SearchHit], threshold: f32) -> Option<&'a SearchHit> {
    if let Some(hit) = hits.iter().find(|hit| hit.similarity >= threshold) {
        info!("Found similar question with similarity {:.3}", hit.similarity);
        return Some(hit);
    }

    let normalized = normalize_question(question);
    let exact = hits
        .iter()
        .find(|hit| normalize_question(&hit.question) == normalized);
    if exact.is_some() {
        info!("Found exact normalized match");
    }
    exact
}

/// Duplicate detection and storage of generated interview questions.
pub struct QuestionDeduplicationService {
    retrieval: Arc<VectorRetrievalService>,
    /// f32 bits; read on every check, written rarely
    threshold: AtomicU32,
}

impl std::fmt::Debug for QuestionDeduplicationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestionDeduplicationService")
            .field("collection", &self.retrieval.collection())
            .field("similarity_threshold", &self.similarity_threshold())
            .finish()
    }
}

impl QuestionDeduplicationService {
    /// Create a service with the default threshold of 0.85.
    pub fn new(retrieval: Arc<VectorRetrievalService>) -> Self {
        Self {
            retrieval,
            threshold: AtomicU32::new(DEFAULT_SIMILARITY_THRESHOLD.to_bits()),
        }
    }

    /// Create a service with a validated starting threshold.
    pub fn with_threshold(retrieval: Arc<VectorRetrievalService>, threshold: f32) -> AppResult<Self> {
        let service = Self::new(retrieval);
        if !service.set_similarity_threshold(threshold) {
            return Err(AppError::Config(format!(
                "Similarity threshold must be within [0.0, 1.0], got {}",
                threshold
            )));
        }
        Ok(service)
    }

    pub fn retrieval(&self) -> &Arc<VectorRetrievalService> {
        &self.retrieval
    }

    pub fn similarity_threshold(&self) -> f32 {
        f32::from_bits(self.threshold.load(Ordering::Relaxed))
    }

    /// Replace the threshold. Values outside [0, 1] (and NaN) are rejected
    /// and leave the current threshold in place.
    pub fn set_similarity_threshold(&self, threshold: f32) -> bool {
        if !(0.0..=1.0).contains(&threshold) {
            error!("Invalid threshold value {}: must be between 0.0 and 1.0", threshold);
            return false;
        }

        let old = f32::from_bits(self.threshold.swap(threshold.to_bits(), Ordering::Relaxed));
        info!("Updated similarity threshold from {} to {}", old, threshold);
        true
    }

    /// Search for a duplicate of `question`. `threshold` defaults to the
    /// service threshold.
    ///
    /// Only the top [`DUPLICATE_SEARCH_K`] hits are examined, including for the
    /// normalized-text fallback. An identical question ranked below that many
    /// near-duplicates is not found.
    #[instrument(skip(self, question), fields(question_len = question.len()))]
    pub async fn try_exists(&self, question: &str, threshold: Option<f32>) -> AppResult<Option<SearchHit>> {
        let threshold = threshold.unwrap_or_else(|| self.similarity_threshold());
        let hits = self.retrieval.try_search(question, DUPLICATE_SEARCH_K).await?;

        if hits.is_empty() {
            info!("No similar questions found in the bank");
            return Ok(None);
        }

        for hit in &hits {
            debug!("Candidate '{}' similarity {:.3}", hit.question, hit.similarity);
        }

        let found = find_duplicate(question, &hits, threshold).cloned();
        if found.is_none() {
            info!("No similar questions above threshold {:.2}", threshold);
        }
        Ok(found)
    }

    /// `(true, Some(match))` when a duplicate exists. Search failures count
    /// as "not found".
    pub async fn exists(&self, question: &str, threshold: Option<f32>) -> (bool, Option<SearchHit>) {
        match self.try_exists(question, threshold).await {
            Ok(Some(hit)) => (true, Some(hit)),
            Ok(None) => (false, None),
            Err(e) => {
                error!("Error checking question existence: {}", e);
                (false, None)
            }
        }
    }

    /// Store a generated question tagged with source `llm_generated`.
    pub async fn try_store(&self, question: &str, answer: &str, metadata: QuestionMetadata) -> AppResult<()> {
        if question.trim().is_empty() {
            return Err(AppError::InvalidInput("cannot store empty question".to_string()));
        }

        let document = NewDocument {
            question: question.to_string(),
            answer: answer.to_string(),
            source: Some(LLM_GENERATED_SOURCE.to_string()),
            metadata,
        };

        self.retrieval.try_index_documents(&[document]).await?;
        info!("Stored question: {}", preview(question));
        Ok(())
    }

    pub async fn store(&self, question: &str, answer: &str, metadata: QuestionMetadata) -> bool {
        match self.try_store(question, answer, metadata).await {
            Ok(()) => true,
            Err(AppError::InvalidInput(reason)) => {
                warn!("Question not stored: {}", reason);
                false
            }
            Err(e) => {
                error!("Failed to store question: {}", e);
                false
            }
        }
    }

    /// Check for a duplicate, then store unless one exists (or `force_store`).
    ///
    /// Never fails: every outcome maps to exactly one [`ActionTaken`].
    #[instrument(skip_all, fields(question_len = question.len(), force_store = force_store))]
    pub async fn check_and_store(
        &self,
        question: &str,
        answer: &str,
        metadata: QuestionMetadata,
        force_store: bool,
    ) -> CheckResult {
        let mut result = CheckResult::new(question);

        let existing = match self.try_exists(question, None).await {
            Ok(existing) => existing,
            Err(e) if e.is_index_unavailable() => {
                error!("Error checking question existence: {}", e);
                None
            }
            Err(e) => {
                error!("Error in check_and_store: {}", e);
                return CheckResult::failed(question, &e);
            }
        };

        result.exists = existing.is_some();
        if let Some(hit) = &existing {
            result.similar_question = Some(hit.question.clone());
            result.similarity_score = hit.similarity;
        }

        if result.exists && !force_store {
            info!(
                "Skipping storage, similar question exists with similarity {:.3}",
                result.similarity_score
            );
            result.action_taken = ActionTaken::SkippedSimilarExists;
            return result;
        }

        match self.try_store(question, answer, metadata).await {
            Ok(()) => {
                result.stored = true;
                result.action_taken = if result.exists {
                    ActionTaken::StoredDespiteSimilarity
                } else {
                    ActionTaken::StoredNewQuestion
                };
            }
            Err(e) if e.is_index_unavailable() || matches!(e, AppError::InvalidInput(_)) => {
                warn!("Storage failed: {}", e);
                result.action_taken = ActionTaken::StorageFailed;
            }
            Err(e) => {
                error!("Error in check_and_store: {}", e);
                return CheckResult::failed(question, &e);
            }
        }

        result
    }

    /// Convenience entry point for the interview flow.
    pub async fn check_and_store_interview_question(
        &self,
        question: &str,
        answer: &str,
        skill_context: Option<&str>,
        user_id: Option<&str>,
        interview_session: Option<&str>,
    ) -> CheckResult {
        let metadata = QuestionMetadata {
            skill_context: skill_context.map(str::to_string),
            user_id: user_id.map(str::to_string),
            interview_session: interview_session.map(str::to_string),
            timestamp: None,
        };

        self.check_and_store(question, answer, metadata, false).await
    }

    /// Check-and-store each item in order (never forced), tagging results
    /// with their position. A store by an earlier item is visible to later ones.
    pub async fn batch_check_and_store(&self, items: &[BatchItem]) -> Vec<CheckResult> {
        let mut results = Vec::with_capacity(items.len());

        for (i, item) in items.iter().enumerate() {
            info!("Processing question {}/{}", i + 1, items.len());

            let mut result = self
                .check_and_store(&item.question, &item.answer, item.metadata.clone(), false)
                .await;
            result.batch_index = Some(i);
            results.push(result);
        }

        let summary = summarize(&results);
        info!(
            "Batch processing complete: {} stored, {} skipped, {} failed, {} errors",
            summary.stored, summary.skipped, summary.failed, summary.errors
        );

        results
    }

    pub fn stats(&self) -> DedupStats {
        DedupStats {
            similarity_threshold: self.similarity_threshold(),
            index_connected: self.retrieval.is_connected(),
            collection: self.retrieval.collection().to_string(),
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(100).collect()
}
