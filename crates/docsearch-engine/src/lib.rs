//! docsearch-engine
//!
//! Retrieval strategies with capability-driven fallback, retrieval-augmented
//! answering, and the [`SearchService`] facade the CLI talks to.

pub mod rag;
pub mod retrieval;
pub mod service;

pub use rag::{ChatRequest, RagOrchestrator, DEFAULT_SYSTEM_PROMPT, NO_DOCUMENTS_ANSWER};
pub use retrieval::{RetrievalEngine, VectorMode, OVERFETCH_FACTOR};
pub use service::{AudioUpload, Collaborators, SearchService};

use std::sync::Arc;

use docsearch_core::traits::Embedder;
use docsearch_core::types::Embedding;
use docsearch_core::Error;

/// Trims `query`, rejecting empty input.
pub(crate) fn validate_query<'a>(query: &'a str, what: &str) -> Result<&'a str, Error> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidQuery(format!("{what} must not be empty")));
    }
    Ok(trimmed)
}

/// Runs the embedder on the blocking pool; model inference is CPU-bound.
pub(crate) async fn embed_text(embedder: &Arc<dyn Embedder>, text: &str) -> Result<Embedding, Error> {
    let embedder = Arc::clone(embedder);
    let text = text.to_string();
    tokio::task::spawn_blocking(move || embedder.embed(&text))
        .await
        .map_err(|e| Error::Embedding(format!("embedding task failed: {e}")))?
        .map_err(|e| Error::Embedding(e.to_string()))
}
