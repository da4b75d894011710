//! Check-and-store behaviour of the deduplication service.

use super::support::{
    memory_service, point_count, trigram_service, ScriptedEmbedder, UnreachableStore, COLLECTION,
};
use crate::dedup::{ActionTaken, BatchItem, QuestionDeduplicationService};
use crate::embeddings::providers::trigram::TrigramProvider;
use crate::retrieval::VectorRetrievalService;
use crate::store::VectorStore;
use crate::types::{NewDocument, QuestionMetadata, LLM_GENERATED_SOURCE};
use std::sync::Arc;

#[tokio::test]
async fn test_reindexing_same_content_is_idempotent() {
    let (service, store) = memory_service(Arc::new(TrigramProvider::new(384)));
    let doc = NewDocument::new("What is a Python decorator?", "A function that wraps another.");

    assert!(service.index_documents(&[doc.clone()]).await);
    assert!(service.index_documents(&[doc]).await);

    assert_eq!(point_count(&store).await, 1);
}

#[tokio::test]
async fn test_intra_batch_duplicates_collapse_to_one_point() {
    let (service, store) = memory_service(Arc::new(TrigramProvider::new(384)));
    let doc = NewDocument::new("What is a generator?", "A lazy iterator.");

    assert!(service.index_documents(&[doc.clone(), doc]).await);
    assert_eq!(point_count(&store).await, 1);
}

#[tokio::test]
async fn test_empty_questions_are_rejected_without_error() {
    let (service, store) = memory_service(Arc::new(TrigramProvider::new(384)));
    let dedup = QuestionDeduplicationService::new(service.clone());

    assert!(!dedup.store("", "answer", QuestionMetadata::default()).await);
    assert!(!service.index_documents(&[NewDocument::new("   ", "")]).await);
    assert_eq!(point_count(&store).await, 0);
}

#[tokio::test]
async fn test_threshold_boundary_is_inclusive() {
    let embedder = ScriptedEmbedder::new(vec![0.0, 0.0])
        .with("How do Python lists grow?", vec![1.0, 0.0])
        .with("Explain list resizing", vec![0.6, 0.8]);
    let (service, _store) = memory_service(Arc::new(embedder));
    service
        .index_documents(&[NewDocument::new("How do Python lists grow?", "Over-allocation.")])
        .await;
    let dedup = QuestionDeduplicationService::new(service.clone());

    let hits = service.search("Explain list resizing", 1).await;
    let similarity = hits[0].similarity;
    assert!(similarity > 0.0 && similarity < 0.85);

    let (exists, found) = dedup.exists("Explain list resizing", Some(similarity)).await;
    assert!(exists);
    assert_eq!(found.unwrap().similarity, similarity);

    let just_above = f32::from_bits(similarity.to_bits() + 1);
    let (exists, found) = dedup.exists("Explain list resizing", Some(just_above)).await;
    assert!(!exists);
    assert!(found.is_none());

    // Default threshold of 0.85 is not met either.
    assert!(!dedup.exists("Explain list resizing", None).await.0);
}

#[tokio::test]
async fn test_normalized_text_matches_regardless_of_embedding() {
    // Orthogonal vectors: only the exact-text fallback can match.
    let embedder = ScriptedEmbedder::new(vec![0.0, 0.0, 1.0])
        .with("What is Python?", vec![1.0, 0.0, 0.0])
        .with("what is python", vec![0.0, 1.0, 0.0]);
    let (service, _store) = memory_service(Arc::new(embedder));
    let dedup = QuestionDeduplicationService::new(service.clone());

    assert!(dedup.store("What is Python?", "A language.", QuestionMetadata::default()).await);

    let (exists, found) = dedup.exists("what is python", None).await;
    assert!(exists);
    let found = found.unwrap();
    assert_eq!(found.question, "What is Python?");
    assert!(found.similarity.abs() < 1e-6);
}

#[tokio::test]
async fn test_check_and_store_action_sequence() {
    let (service, store) = memory_service(Arc::new(TrigramProvider::new(384)));
    let dedup = QuestionDeduplicationService::new(service);

    let first = dedup.check_and_store("Q1", "A1", QuestionMetadata::default(), false).await;
    assert_eq!(first.action_taken, ActionTaken::StoredNewQuestion);
    assert!(first.stored);
    assert!(!first.exists);
    assert_eq!(first.similar_question, None);
    assert_eq!(first.similarity_score, 0.0);

    let second = dedup.check_and_store("Q1", "A1", QuestionMetadata::default(), false).await;
    assert_eq!(second.action_taken, ActionTaken::SkippedSimilarExists);
    assert!(second.exists);
    assert!(!second.stored);
    assert_eq!(second.similar_question.as_deref(), Some("Q1"));
    assert!((second.similarity_score - 1.0).abs() < 1e-4);

    let forced = dedup.check_and_store("Q1", "A1", QuestionMetadata::default(), true).await;
    assert_eq!(forced.action_taken, ActionTaken::StoredDespiteSimilarity);
    assert!(forced.stored);
    assert!(forced.exists);
    assert_eq!(forced.error, None);

    // Same content id: the forced store refreshed the existing point.
    assert_eq!(point_count(&store).await, 1);
}

#[tokio::test]
async fn test_paraphrase_is_detected_as_similar() {
    let dedup = QuestionDeduplicationService::new(trigram_service());
    dedup
        .check_and_store(
            "How do I reverse a list in Python?",
            "Use reversed() or slicing.",
            QuestionMetadata::default(),
            false,
        )
        .await;

    assert!(dedup.set_similarity_threshold(0.5));
    let result = dedup
        .check_and_store("reverse a python list", "", QuestionMetadata::default(), false)
        .await;

    assert_eq!(result.action_taken, ActionTaken::SkippedSimilarExists);
    assert_eq!(
        result.similar_question.as_deref(),
        Some("How do I reverse a list in Python?")
    );
}

#[tokio::test]
async fn test_exists_on_empty_collection_finds_nothing() {
    let (service, store) = memory_service(Arc::new(TrigramProvider::new(384)));
    assert!(service.ensure_collection().await);
    assert_eq!(store.count(COLLECTION).await.unwrap(), Some(0));

    let dedup = QuestionDeduplicationService::new(service);
    assert!(dedup.try_exists("What is Python?", None).await.unwrap().is_none());
    assert_eq!(dedup.exists("What is Python?", Some(0.0)).await, (false, None));
}

#[tokio::test]
async fn test_unavailable_index_degrades_gracefully() {
    let offline = Arc::new(VectorRetrievalService::unavailable(
        Arc::new(TrigramProvider::new(384)),
        COLLECTION,
    ));
    let unreachable = Arc::new(VectorRetrievalService::new(
        Arc::new(TrigramProvider::new(384)),
        Arc::new(UnreachableStore),
        COLLECTION,
    ));

    for service in [offline, unreachable] {
        assert!(service.search("What is a closure?", 5).await.is_empty());
        assert!(!service.has_data().await);
        assert!(!service.ensure_collection().await);

        let dedup = QuestionDeduplicationService::new(service);
        assert_eq!(dedup.exists("What is a closure?", None).await, (false, None));

        let result = dedup
            .check_and_store("What is a closure?", "A function with captured scope.", QuestionMetadata::default(), false)
            .await;
        assert_eq!(result.action_taken, ActionTaken::StorageFailed);
        assert!(!result.exists);
        assert!(!result.stored);
        assert_eq!(result.similarity_score, 0.0);
    }
}

#[tokio::test]
async fn test_interview_question_metadata_is_persisted() {
    let (service, store) = memory_service(Arc::new(TrigramProvider::new(384)));
    let dedup = QuestionDeduplicationService::new(service.clone());

    let result = dedup
        .check_and_store_interview_question(
            "What does the with statement do?",
            "Runs a context manager.",
            Some("python"),
            Some("user-42"),
            Some("session-7"),
        )
        .await;
    assert_eq!(result.action_taken, ActionTaken::StoredNewQuestion);

    let vector = service.embed("What does the with statement do?").await.unwrap();
    let points = store.search(COLLECTION, &vector, 1).await.unwrap();
    let payload = &points[0].payload;
    assert_eq!(payload.source.as_deref(), Some(LLM_GENERATED_SOURCE));
    assert_eq!(payload.metadata.skill_context.as_deref(), Some("python"));
    assert_eq!(payload.metadata.user_id.as_deref(), Some("user-42"));
    assert_eq!(payload.metadata.interview_session.as_deref(), Some("session-7"));
    assert_eq!(payload.metadata.timestamp, None);
}

#[tokio::test]
async fn test_batch_check_and_store_sees_earlier_items() {
    let dedup = QuestionDeduplicationService::new(trigram_service());
    let item = |question: &str| BatchItem {
        question: question.to_string(),
        answer: "See docs.".to_string(),
        ..Default::default()
    };

    let results = dedup
        .batch_check_and_store(&[
            item("What is list comprehension?"),
            item("What is list comprehension?"),
            item(""),
        ])
        .await;

    let actions: Vec<ActionTaken> = results.iter().map(|r| r.action_taken).collect();
    assert_eq!(
        actions,
        vec![
            ActionTaken::StoredNewQuestion,
            ActionTaken::SkippedSimilarExists,
            ActionTaken::StorageFailed,
        ]
    );
    let indexes: Vec<Option<usize>> = results.iter().map(|r| r.batch_index).collect();
    assert_eq!(indexes, vec![Some(0), Some(1), Some(2)]);

    let summary = crate::dedup::summarize(&results);
    assert_eq!((summary.stored, summary.skipped, summary.failed, summary.errors), (1, 1, 1, 0));
}

#[tokio::test]
async fn test_threshold_updates_are_validated() {
    let service = trigram_service();
    let dedup = QuestionDeduplicationService::new(service.clone());

    assert_eq!(dedup.similarity_threshold(), 0.85);
    assert!(!dedup.set_similarity_threshold(1.5));
    assert!(!dedup.set_similarity_threshold(-0.1));
    assert!(!dedup.set_similarity_threshold(f32::NAN));
    assert_eq!(dedup.similarity_threshold(), 0.85);

    assert!(dedup.set_similarity_threshold(0.7));
    let stats = dedup.stats();
    assert_eq!(stats.similarity_threshold, 0.7);
    assert!(stats.index_connected);
    assert_eq!(stats.collection, COLLECTION);

    assert!(QuestionDeduplicationService::with_threshold(service, 2.0).is_err());
}

#[test]
fn test_check_result_serializes_contract_fields() {
    let result = crate::dedup::CheckResult {
        question: "Q".to_string(),
        exists: true,
        stored: false,
        similar_question: Some("Q".to_string()),
        similarity_score: 1.0,
        action_taken: ActionTaken::SkippedSimilarExists,
        error: None,
        batch_index: Some(3),
    };

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["action_taken"], "skipped_similar_exists");
    assert_eq!(json["similar_question"], "Q");
    assert_eq!(json["batch_index"], 3);
    assert!(json.get("error").is_none());
}
