//! The upward interface: every call returns its domain result together with
//! exactly one telemetry record, or an [`OperationError`] carrying one.
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use docsearch_core::config::Settings;
use docsearch_core::response::{
    ChatAnswer, DocumentList, GenerationHealth, HealthReport, HealthStatus, IngestReceipt, SearchResponse,
};
use docsearch_core::traits::{DocumentStore, Embedder, Generator, Transcriber};
use docsearch_core::types::{DocumentDraft, DocumentView, DocumentMetadata, DocumentSource, IndexState, RetrievalResult, SortOrder};
use docsearch_core::{Error, OperationError, OperationTimer, SearchOperation, Strategy};

use crate::rag::{ChatRequest, RagOrchestrator};
use crate::retrieval::{RetrievalEngine, VectorMode};
use crate::embed_text;

/// Capability name of the store's full-text index.
const TEXT_INDEX: &str = "text";

/// Collaborator handles injected at construction.
pub struct Collaborators {
    pub store: Arc<dyn DocumentStore>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
}

/// An uploaded recording to transcribe and ingest.
#[derive(Debug, Clone, Default)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub language: Option<String>,
    /// Defaults to the file stem.
    pub title: Option<String>,
    pub tags: Vec<String>,
}

pub struct SearchService {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
    transcriber: Option<Arc<dyn Transcriber>>,
    retrieval: Arc<RetrievalEngine>,
    rag: RagOrchestrator,
    settings: Settings,
}

impl SearchService {
    pub fn new(collaborators: Collaborators, settings: Settings) -> Self {
        let Collaborators { store, embedder, generator, transcriber } = collaborators;
        let retrieval = Arc::new(RetrievalEngine::new(Arc::clone(&store), Arc::clone(&embedder), settings.vector.index_name.clone()));
        let mut rag = RagOrchestrator::new(
            Arc::clone(&retrieval),
            generator,
            Duration::from_secs(settings.generation.timeout_secs),
            settings.rag.max_context_docs_cap,
        );
        if let Some(prompt) = settings.rag.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            rag = rag.with_system_prompt(prompt);
        }
        Self { store, embedder, transcriber, retrieval, rag, settings }
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn retrieval(&self) -> &RetrievalEngine { &self.retrieval }

    pub async fn search_lexical(&self, query: &str) -> Result<SearchResponse, OperationError> {
        let (results, telemetry) = self.retrieval.lexical_search(query, self.settings.search.lexical_limit).await?;
        Ok(search_response(query, results, telemetry))
    }

    /// `limit` and `strict` default to `search.default_limit` and `search.semantic_strict`.
    pub async fn search_semantic(&self, query: &str, limit: Option<usize>, strict: Option<bool>) -> Result<SearchResponse, OperationError> {
        let k = limit.unwrap_or(self.settings.search.default_limit);
        let mode = VectorMode::from_strict(strict.unwrap_or(self.settings.search.semantic_strict));
        let (results, telemetry) = self.retrieval.vector_search(query, k, mode).await?;
        Ok(search_response(query, results, telemetry))
    }

    pub async fn chat(
        &self,
        question: &str,
        max_context_docs: Option<usize>,
        system_prompt: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<ChatAnswer, OperationError> {
        self.rag
            .answer(ChatRequest {
                question,
                max_context_docs: max_context_docs.unwrap_or(self.settings.rag.max_context_docs),
                system_prompt,
                timeout,
            })
            .await
    }

    /// Embeds and stores a submitted document. Nothing is stored if embedding fails.
    pub async fn ingest(&self, draft: DocumentDraft) -> Result<IngestReceipt, OperationError> {
        let timer = OperationTimer::start(Strategy::Ingest, &draft.title);
        let outcome = self.store_draft(draft).await;
        let (document, telemetry) = timer.conclude(outcome, |_| 1)?;
        Ok(IngestReceipt { document, transcript_language: None, telemetry })
    }

    /// Transcribes an upload and ingests the transcript as an audio-sourced document.
    pub async fn ingest_audio(&self, upload: AudioUpload) -> Result<IngestReceipt, OperationError> {
        let timer = OperationTimer::start(Strategy::Ingest, &upload.file_name);
        let outcome = self.transcribe_and_store(upload).await;
        let ((document, language), telemetry) = timer.conclude(outcome, |_| 1)?;
        Ok(IngestReceipt { document, transcript_language: language, telemetry })
    }

    async fn transcribe_and_store(&self, upload: AudioUpload) -> Result<(DocumentView, Option<String>), Error> {
        let transcriber = self
            .transcriber
            .as_ref()
            .ok_or_else(|| Error::Transcription("no transcription backend configured".into()))?;
        if upload.bytes.is_empty() {
            return Err(Error::InvalidQuery("audio upload is empty".into()));
        }
        let AudioUpload { bytes, file_name, language, title, tags } = upload;
        let transcript = transcriber
            .transcribe(bytes, &file_name, language.as_deref())
            .await
            .map_err(|e| Error::Transcription(e.to_string()))?;
        if transcript.text.trim().is_empty() {
            return Err(Error::Transcription("transcript is empty".into()));
        }
        tracing::info!(file = %file_name, language = ?transcript.detected_language, chars = transcript.text.len(), "audio transcribed");

        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| Path::new(&file_name).file_stem().map_or_else(|| file_name.clone(), |s| s.to_string_lossy().into_owned()));
        let mut metadata = DocumentMetadata::new(DocumentSource::Audio);
        metadata.detected_language = transcript.detected_language.clone().or(language);
        metadata.origin = Some(file_name);
        let draft = DocumentDraft { title, body: transcript.text, tags, metadata };
        let view = self.store_draft(draft).await?;
        Ok((view, transcript.detected_language))
    }

    async fn store_draft(&self, draft: DocumentDraft) -> Result<DocumentView, Error> {
        if draft.title.trim().is_empty() && draft.body.trim().is_empty() {
            return Err(Error::InvalidQuery("document must have a title or a body".into()));
        }
        let embedding = embed_text(&self.embedder, &draft.embedding_text()).await?;
        let new = draft.with_embedding(Some(embedding));
        let id = self.store.insert(new.clone()).await.map_err(Error::store(Strategy::Ingest))?;
        tracing::info!(%id, title = %new.title, "document ingested");
        Ok(new.into_document(id).view())
    }

    /// `limit` defaults to `search.default_limit`.
    pub async fn list_documents(&self, limit: Option<usize>, order: SortOrder) -> Result<DocumentList, OperationError> {
        let limit = limit.unwrap_or(self.settings.search.default_limit);
        let timer = OperationTimer::start(Strategy::Listing, "").with_limit(limit);
        let outcome = async {
            let docs = self.store.list(limit, order).await.map_err(Error::store(Strategy::Listing))?;
            let total = self.store.count().await.map_err(Error::store(Strategy::Listing))?;
            Ok::<_, Error>((docs, total))
        }
        .await;
        let ((docs, total), telemetry) = timer.conclude(outcome, |(docs, _)| docs.len())?;
        Ok(DocumentList { documents: docs.iter().map(|d| d.view()).collect(), total, telemetry })
    }

    /// Probes every collaborator. Never fails; problems are reported in the body.
    pub async fn health_probe(&self) -> HealthReport {
        let mut timer = OperationTimer::start(Strategy::Health, "");

        let (document_count, store_error) = match self.store.count().await {
            Ok(n) => (Some(n), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let text_index = self.store.capability_probe(TEXT_INDEX).await.ok();
        let vector_index = self.store.capability_probe(self.retrieval.vector_index()).await.ok();
        if let Some(state) = vector_index {
            timer.set_index_state(state);
        }

        let generator = self.rag.generator();
        let generation = match generator.ping().await {
            Ok(()) => GenerationHealth { backend_id: generator.backend_id(), reachable: true, error: None },
            Err(e) => GenerationHealth { backend_id: generator.backend_id(), reachable: false, error: Some(e.to_string()) },
        };

        let status = if store_error.is_some() {
            HealthStatus::Unavailable
        } else if text_index != Some(IndexState::Present) || vector_index != Some(IndexState::Present) || !generation.reachable {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ok
        };

        HealthReport {
            status,
            text_index,
            vector_index,
            document_count,
            embedding_dim: self.embedder.dim(),
            store_error,
            generation,
            telemetry: timer.finish(1),
        }
    }
}

fn search_response(query: &str, results: RetrievalResult, telemetry: SearchOperation) -> SearchResponse {
    let results: Vec<_> = results.iter().map(|r| r.view()).collect();
    SearchResponse { query: query.to_string(), total: results.len(), results, telemetry }
}
