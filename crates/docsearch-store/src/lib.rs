//! docsearch-store
//!
//! `LocalDocumentStore` puts the LanceDB documents table and the optional
//! Tantivy full-text index behind the [`DocumentStore`] contract.
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use docsearch_core::config::{resolve_with_base, Settings};
use docsearch_core::traits::DocumentStore;
use docsearch_core::types::{Document, DocumentId, IndexState, NewDocument, ScoredDocument, SortOrder};
use docsearch_core::StoreError;
use docsearch_text::baseline::rank_by_keywords;
use docsearch_text::{TantivyIndex, TextEntry, TextIndexError};
use docsearch_vector::{IvfPqParams, LanceTable};

/// Capability name under which the full-text index is probed.
pub const TEXT_INDEX_NAME: &str = "text";

pub struct LocalDocumentStore {
    table: LanceTable,
    text: Option<Arc<TantivyIndex>>,
}

impl LocalDocumentStore {
    pub fn new(table: LanceTable, text: Option<Arc<TantivyIndex>>) -> Self {
        Self { table, text }
    }

    /// Opens the table and, unless disabled, the full-text index. Relative
    /// data paths resolve against `base`.
    pub async fn open(settings: &Settings, base: &Path) -> Result<Self> {
        let lancedb_dir = resolve_with_base(base, &settings.data.lancedb_dir);
        std::fs::create_dir_all(&lancedb_dir)?;
        let table = LanceTable::open(&lancedb_dir.to_string_lossy(), &settings.data.table, settings.embedding.dim).await?;
        let text = if settings.data.text_index_enabled {
            let dir = resolve_with_base(base, &settings.data.text_index_dir);
            Some(Arc::new(TantivyIndex::open_or_create(&dir)?))
        } else {
            tracing::info!("full-text index disabled; lexical search will use keyword matching");
            None
        };
        let store = Self::new(table, text);
        store.sync_text_index().await?;
        Ok(store)
    }

    pub fn table(&self) -> &LanceTable { &self.table }

    pub async fn build_vector_index(&self, index_name: &str) -> Result<IvfPqParams> {
        self.table.build_vector_index(index_name).await
    }

    /// Rebuilds the full-text index from the table when their document counts
    /// differ, e.g. after the index was enabled on an existing corpus.
    pub async fn sync_text_index(&self) -> Result<(), StoreError> {
        let Some(text) = self.text.clone() else { return Ok(()) };
        let rows = self.table.count().await?;
        let indexed = text.num_docs();
        if indexed == rows as u64 {
            return Ok(());
        }
        tracing::warn!(table = self.table.name(), rows, indexed, "full-text index out of step with documents; rebuilding");
        let docs: Vec<Document> = self.table.scan(None).await?.into_iter().map(|r| r.document).collect();
        tokio::task::spawn_blocking(move || {
            let entries: Vec<TextEntry<'_>> = docs
                .iter()
                .map(|d| TextEntry { id: &d.id, title: &d.title, body: &d.body, tags: &d.tags })
                .collect();
            text.rebuild(&entries)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("text rebuild task failed: {e}")))?
        .map_err(map_text_error)
    }

    async fn index_text(&self, doc: &Document) -> Result<(), StoreError> {
        let Some(text) = self.text.clone() else { return Ok(()) };
        let (id, title, body, tags) = (doc.id.clone(), doc.title.clone(), doc.body.clone(), doc.tags.clone());
        tokio::task::spawn_blocking(move || {
            text.add(&[TextEntry { id: &id, title: &title, body: &body, tags: &tags }])
        })
        .await
        .map_err(|e| StoreError::Backend(format!("text indexing task failed: {e}")))?
        .map_err(map_text_error)
    }
}

fn map_text_error(e: TextIndexError) -> StoreError {
    match e {
        TextIndexError::MalformedQuery(q) => StoreError::MalformedQuery(q.to_string()),
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn insert(&self, doc: NewDocument) -> Result<DocumentId, StoreError> {
        let stored = self.table.insert(doc).await?;
        if let Err(e) = self.index_text(&stored).await {
            // A row left behind here is reindexed by the next sync_text_index.
            if let Err(rollback) = self.table.delete(&stored.id).await {
                tracing::warn!(id = %stored.id, error = %rollback, "could not remove row after full-text indexing failed");
            }
            return Err(e);
        }
        Ok(stored.id)
    }

    async fn list(&self, limit: usize, order: SortOrder) -> Result<Vec<Document>, StoreError> {
        let rows = self.table.scan(None).await?;
        let docs = rows.into_iter().map(|r| r.document);
        Ok(match order {
            SortOrder::OldestFirst => docs.take(limit).collect(),
            SortOrder::NewestFirst => docs.rev().take(limit).collect(),
        })
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.table.count().await
    }

    async fn lexical_search(&self, query: &str, limit: usize) -> Result<Vec<ScoredDocument>, StoreError> {
        let Some(text) = self.text.clone() else {
            return Err(StoreError::IndexAbsent(TEXT_INDEX_NAME.into()));
        };
        let q = query.to_string();
        let hits = tokio::task::spawn_blocking(move || text.search(&q, limit))
            .await
            .map_err(|e| StoreError::Backend(format!("text search task failed: {e}")))?
            .map_err(map_text_error)?;
        let ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
        let mut docs: std::collections::HashMap<String, Document> =
            self.table.fetch_by_ids(&ids).await?.into_iter().map(|d| (d.id.clone(), d)).collect();
        Ok(hits
            .into_iter()
            .filter_map(|h| docs.remove(&h.id).map(|d| ScoredDocument::new(d, h.score)))
            .collect())
    }

    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<ScoredDocument>, StoreError> {
        let docs: Vec<Document> = self.table.scan(None).await?.into_iter().map(|r| r.document).collect();
        let q = query.to_string();
        tokio::task::spawn_blocking(move || rank_by_keywords(&q, docs, limit))
            .await
            .map_err(|e| StoreError::Backend(format!("keyword ranking task failed: {e}")))
    }

    async fn vector_search(&self, vector: &[f32], k: usize, candidates: usize) -> Result<Vec<ScoredDocument>, StoreError> {
        self.table.vector_search(vector, k, candidates).await
    }

    async fn scan_with_vectors(&self) -> Result<Vec<Document>, StoreError> {
        self.table.scan_with_vectors().await
    }

    async fn capability_probe(&self, index_name: &str) -> Result<IndexState, StoreError> {
        if index_name == TEXT_INDEX_NAME {
            return Ok(if self.text.is_some() { IndexState::Present } else { IndexState::Absent });
        }
        self.table.probe(index_name).await
    }
}
