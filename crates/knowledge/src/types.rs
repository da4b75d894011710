//! Question bank type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source tag attached to questions stored at interview-generation time.
pub const LLM_GENERATED_SOURCE: &str = "llm_generated";

/// Informational metadata carried with a stored question.
///
/// Never used for similarity; only persisted alongside the point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionMetadata {
    /// Skill or topic the question was generated for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_context: Option<String>,

    /// User whose interview produced the question
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Interview session identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview_session: Option<String>,

    /// When the question was produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl QuestionMetadata {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A question/answer pair submitted for indexing.
///
/// This is also the shape of a corpus file entry; unknown JSON fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    /// Question text, the query key
    #[serde(default)]
    pub question: String,

    /// Reference answer, may be empty
    #[serde(default)]
    pub answer: String,

    /// Where the document came from (e.g. "llm_generated")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Informational metadata
    #[serde(default, skip_serializing_if = "QuestionMetadata::is_empty")]
    pub metadata: QuestionMetadata,
}

impl NewDocument {
    /// Create a document from a question and answer.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            ..Default::default()
        }
    }
}

/// Payload stored with every point in the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub question: String,
    pub answer: String,
    /// Position of the document in the batch it was indexed with
    pub source_index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub metadata: QuestionMetadata,
}

/// A vector index entry: content-derived id, question embedding and payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// A point returned by a nearest-neighbour query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    /// Cosine similarity to the query vector, in [-1, 1]
    pub score: f32,
    pub payload: PointPayload,
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub question: String,
    pub answer: String,
    /// Raw cosine similarity
    pub similarity: f32,
    /// 1-based rank, 1 is the most similar
    pub rank: usize,
}

/// Snapshot of the question bank collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    /// "active", "unavailable" or "error"
    pub status: String,
    pub points_count: u64,
    pub embedding_dimension: usize,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_entry_ignores_unknown_fields() {
        let doc: NewDocument = serde_json::from_str(
            r#"{"question": "What is a decorator?", "answer": "A callable wrapper.", "difficulty": "easy"}"#,
        )
        .unwrap();

        assert_eq!(doc.question, "What is a decorator?");
        assert_eq!(doc.answer, "A callable wrapper.");
        assert!(doc.metadata.is_empty());
    }

    #[test]
    fn test_missing_answer_defaults_to_empty() {
        let doc: NewDocument = serde_json::from_str(r#"{"question": "What is GIL?"}"#).unwrap();
        assert_eq!(doc.answer, "");
        assert_eq!(doc.source, None);
    }

    #[test]
    fn test_metadata_skips_absent_fields() {
        let metadata = QuestionMetadata {
            skill_context: Some("python".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json, serde_json::json!({"skill_context": "python"}));
    }
}
