use std::sync::Arc;

use docsearch_core::similarity::rank_by_similarity;
use docsearch_core::traits::{DocumentStore, Embedder};
use docsearch_core::types::{Embedding, IndexState, RetrievalResult};
use docsearch_core::{Error, OperationError, OperationTimer, SearchOperation, StoreError, Strategy};

use crate::{embed_text, validate_query};

/// Native vector queries examine `k * OVERFETCH_FACTOR` candidates.
pub const OVERFETCH_FACTOR: usize = 10;

/// What vector search does when the index is not queryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorMode {
    /// Fail with [`Error::VectorSearchUnavailable`].
    Strict,
    /// Rank every stored embedding by brute force.
    Fallback,
}

impl VectorMode {
    pub fn from_strict(strict: bool) -> Self {
        if strict { VectorMode::Strict } else { VectorMode::Fallback }
    }
}

pub struct RetrievalEngine {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
    vector_index: String,
}

impl RetrievalEngine {
    pub fn new(store: Arc<dyn DocumentStore>, embedder: Arc<dyn Embedder>, vector_index: impl Into<String>) -> Self {
        Self { store, embedder, vector_index: vector_index.into() }
    }

    pub fn vector_index(&self) -> &str { &self.vector_index }

    /// Full-text search, degrading to keyword matching when the full-text index is absent.
    pub async fn lexical_search(&self, query: &str, limit: usize) -> Result<(RetrievalResult, SearchOperation), OperationError> {
        let mut timer = OperationTimer::start(Strategy::Lexical, query).with_limit(limit);
        let outcome = self.run_lexical(query, limit, &mut timer).await;
        timer.conclude(outcome, Vec::len)
    }

    async fn run_lexical(&self, query: &str, limit: usize, timer: &mut OperationTimer) -> Result<RetrievalResult, Error> {
        let query = validate_query(query, "query")?;
        if limit == 0 {
            return Err(Error::InvalidQuery("limit must be positive".into()));
        }
        match self.store.lexical_search(query, limit).await {
            Ok(results) => {
                timer.set_index_state(IndexState::Present);
                Ok(results)
            }
            Err(StoreError::IndexAbsent(index)) => {
                tracing::info!(%index, "full-text index absent; using keyword match");
                timer.set_index_state(IndexState::Absent);
                timer.fall_back_to(Strategy::LexicalBaseline);
                self.store.keyword_search(query, limit).await.map_err(Error::store(Strategy::LexicalBaseline))
            }
            Err(e) => Err(Error::store(Strategy::Lexical)(e)),
        }
    }

    /// Top-`k` semantic search.
    pub async fn vector_search(&self, query: &str, k: usize, mode: VectorMode) -> Result<(RetrievalResult, SearchOperation), OperationError> {
        let mut timer = OperationTimer::start(Strategy::VectorNative, query).with_limit(k);
        let outcome = self.run_vector(query, k, mode, &mut timer).await;
        timer.conclude(outcome, Vec::len)
    }

    /// Vector search reporting into a timer owned by the caller.
    pub(crate) async fn run_vector(&self, query: &str, k: usize, mode: VectorMode, timer: &mut OperationTimer) -> Result<RetrievalResult, Error> {
        let query = validate_query(query, "query")?;
        if k == 0 {
            return Err(Error::InvalidQuery("k must be positive".into()));
        }
        let vector = embed_text(&self.embedder, query).await?;

        let state = match self.store.capability_probe(&self.vector_index).await {
            Ok(state) => state,
            Err(StoreError::IndexAbsent(_)) => IndexState::Absent,
            Err(e) => return Err(Error::store(Strategy::VectorNative)(e)),
        };
        timer.set_index_state(state);

        if state.is_queryable() {
            return self
                .store
                .vector_search(&vector, k, k.saturating_mul(OVERFETCH_FACTOR))
                .await
                .map_err(Error::store(Strategy::VectorNative));
        }
        match mode {
            VectorMode::Strict => Err(Error::VectorSearchUnavailable { index: self.vector_index.clone(), state }),
            VectorMode::Fallback => {
                tracing::info!(index = %self.vector_index, %state, "vector index not queryable; ranking by brute force");
                timer.fall_back_to(Strategy::VectorFallback);
                self.brute_force(vector, k).await
            }
        }
    }

    async fn brute_force(&self, vector: Embedding, k: usize) -> Result<RetrievalResult, Error> {
        let documents = self.store.scan_with_vectors().await.map_err(Error::store(Strategy::VectorFallback))?;
        tracing::debug!(candidates = documents.len(), k, "brute-force ranking");
        tokio::task::spawn_blocking(move || rank_by_similarity(&vector, documents, k))
            .await
            .map_err(|e| Error::store(Strategy::VectorFallback)(StoreError::Backend(format!("ranking task failed: {e}"))))
    }
}
