use async_trait::async_trait;
use std::time::Duration;

use crate::error::{GenerationError, StoreError};
use crate::types::{Document, DocumentId, IndexState, NewDocument, ScoredDocument, SortOrder, Transcript};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str, language: Option<&str>) -> anyhow::Result<Transcript>;
}

/// Persistence and query surface the retrieval engine needs from a store.
///
/// Results are always in store order unless they are ranked, and ranked
/// results are descending by score with ties in store order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, doc: NewDocument) -> Result<DocumentId, StoreError>;
    async fn list(&self, limit: usize, order: SortOrder) -> Result<Vec<Document>, StoreError>;
    async fn count(&self) -> Result<usize, StoreError>;

    /// Query the preferred full-text index. Fails with [`StoreError::IndexAbsent`] when it is not provisioned.
    async fn lexical_search(&self, query: &str, limit: usize) -> Result<Vec<ScoredDocument>, StoreError>;
    /// Baseline keyword match, always available.
    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<ScoredDocument>, StoreError>;

    /// Native top-`k` similarity query, examining `candidates` entries before refinement.
    async fn vector_search(&self, vector: &[f32], k: usize, candidates: usize) -> Result<Vec<ScoredDocument>, StoreError>;
    /// Every document with a populated embedding, in insertion order.
    async fn scan_with_vectors(&self) -> Result<Vec<Document>, StoreError>;

    async fn capability_probe(&self, index_name: &str) -> Result<IndexState, StoreError>;
}

/// One generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub system_prompt: &'a str,
    pub context: &'a str,
    pub question: &'a str,
    /// Whole-request budget, independent of the connect timeout.
    pub timeout: Duration,
}

impl GenerationRequest<'_> {
    /// The user turn sent alongside the system prompt.
    pub fn render_prompt(&self) -> String {
        format!("Context:\n{}\nQuestion: {}\n\nAnswer:", self.context, self.question)
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Identifies backend and model, e.g. `ollama:llama3.2`.
    fn backend_id(&self) -> String;
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError>;
    /// Cheap reachability check for health probes.
    async fn ping(&self) -> Result<(), GenerationError>;
}
