mod common;

use std::time::Duration;

use common::{harness, CountingEmbedder, CountingGenerator, GeneratorBehavior, MemoryStore, CORPUS};
use docsearch_core::types::IndexState;
use docsearch_core::{Error, Strategy};
use docsearch_engine::rag::build_context;
use docsearch_engine::{DEFAULT_SYSTEM_PROMPT, NO_DOCUMENTS_ANSWER};

#[tokio::test]
async fn empty_corpus_short_circuits_without_generation() {
    let h = harness(MemoryStore::new(IndexState::Present, true), CountingEmbedder::new(), CountingGenerator::answering("unused"), None);
    let answer = h.service.chat("anything", Some(5), None, None).await.unwrap();
    assert!(answer.sources.is_empty());
    assert_eq!(answer.answer, NO_DOCUMENTS_ANSWER);
    assert_eq!(answer.generation_backend_id, None);
    assert_eq!(h.generator.calls(), 0);
    assert_eq!(answer.telemetry.result_count, 0);
}

#[tokio::test]
async fn chat_builds_ranked_context_and_calls_generator_once() {
    let h = harness(MemoryStore::new(IndexState::Present, true), CountingEmbedder::new(), CountingGenerator::answering("Use a ferro rod."), None);
    h.store.seed(h.embedder.as_ref(), CORPUS);
    let answer = h.service.chat("how do I start a fire", Some(2), None, None).await.unwrap();

    assert_eq!(answer.answer, "Use a ferro rod.");
    assert_eq!(answer.sources.len(), 2);
    assert_eq!(answer.generation_backend_id.as_deref(), Some("test:echo"));
    assert_eq!(answer.telemetry.strategy, Strategy::VectorNative);
    assert_eq!(answer.telemetry.result_count, 2);
    assert_eq!(h.generator.calls(), 1);

    let recorded = h.generator.requests.lock().unwrap()[0].clone();
    assert_eq!(recorded.system_prompt, DEFAULT_SYSTEM_PROMPT);
    assert_eq!(recorded.question, "how do I start a fire");
    assert_eq!(recorded.timeout, Duration::from_secs(300));
    let first = format!("Document 1 (Title: {}):\n", answer.sources[0].title);
    let second = format!("\n\nDocument 2 (Title: {}):\n", answer.sources[1].title);
    assert!(recorded.context.starts_with(&first), "{}", recorded.context);
    assert!(recorded.context.contains(&second), "{}", recorded.context);
}

#[tokio::test]
async fn caller_prompt_and_timeout_override_defaults() {
    let h = harness(MemoryStore::new(IndexState::Present, true), CountingEmbedder::new(), CountingGenerator::answering("ok"), None);
    h.store.seed(h.embedder.as_ref(), CORPUS);
    h.service.chat("solar", Some(1), Some("Answer in French."), Some(Duration::from_secs(7))).await.unwrap();
    let recorded = h.generator.requests.lock().unwrap()[0].clone();
    assert_eq!(recorded.system_prompt, "Answer in French.");
    assert_eq!(recorded.timeout, Duration::from_secs(7));
}

#[tokio::test]
async fn chat_requires_native_index() {
    let h = harness(MemoryStore::new(IndexState::Absent, true), CountingEmbedder::new(), CountingGenerator::answering("x"), None);
    h.store.seed(h.embedder.as_ref(), CORPUS);
    let err = h.service.chat("fire", Some(3), None, None).await.unwrap_err();
    assert!(matches!(err.error, Error::RetrievalUnavailable { state: IndexState::Absent, .. }));
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn context_size_is_validated_and_clamped() {
    let h = harness(MemoryStore::new(IndexState::Present, true), CountingEmbedder::new(), CountingGenerator::answering("x"), None);
    h.store.seed(h.embedder.as_ref(), CORPUS);
    let err = h.service.chat("fire", Some(0), None, None).await.unwrap_err();
    assert!(matches!(err.error, Error::InvalidQuery(_)));

    let answer = h.service.chat("fire", Some(500), None, None).await.unwrap();
    assert_eq!(answer.sources.len(), CORPUS.len());
    assert_eq!(answer.telemetry.requested_limit, Some(500));
}

#[tokio::test]
async fn generation_failures_stay_typed() {
    let h = harness(MemoryStore::new(IndexState::Present, true), CountingEmbedder::new(), CountingGenerator::with(GeneratorBehavior::Timeout), None);
    h.store.seed(h.embedder.as_ref(), CORPUS);
    let err = h.service.chat("fire", Some(2), None, Some(Duration::from_secs(3))).await.unwrap_err();
    assert!(matches!(err.error, Error::Timeout(d) if d == Duration::from_secs(3)));
    assert!(err.telemetry.error.is_some());

    let h = harness(MemoryStore::new(IndexState::Present, true), CountingEmbedder::new(), CountingGenerator::with(GeneratorBehavior::ModelMissing), None);
    h.store.seed(h.embedder.as_ref(), CORPUS);
    let err = h.service.chat("fire", Some(2), None, None).await.unwrap_err();
    assert!(matches!(err.error, Error::ModelMissing(_)));
    assert_eq!(h.generator.calls(), 1);
}

#[tokio::test]
async fn blank_question_is_rejected_without_retrieval() {
    let h = harness(MemoryStore::new(IndexState::Present, true), CountingEmbedder::new(), CountingGenerator::answering("x"), None);
    let err = h.service.chat("  \n", Some(3), None, None).await.unwrap_err();
    assert!(matches!(err.error, Error::InvalidQuery(_)));
    assert_eq!(h.store.calls(), 0);
    assert_eq!(h.embedder.calls(), 0);
}

#[test]
fn context_blocks_are_separated_by_blank_lines() {
    use docsearch_core::types::{DocumentDraft, ScoredDocument};
    let docs: Vec<ScoredDocument> = [("A", "alpha"), ("B", "beta")]
        .iter()
        .enumerate()
        .map(|(i, (t, b))| ScoredDocument::new(DocumentDraft::new(*t, *b).with_embedding(None).into_document(format!("id{i}")), 1.0))
        .collect();
    assert_eq!(build_context(&docs), "Document 1 (Title: A):\nalpha\n\nDocument 2 (Title: B):\nbeta\n");
    assert_eq!(build_context(&[]), "");
}
