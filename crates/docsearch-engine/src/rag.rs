//! Retrieval-augmented answering over the semantic index.
use std::sync::Arc;
use std::time::Duration;

use docsearch_core::response::ChatAnswer;
use docsearch_core::traits::{GenerationRequest, Generator};
use docsearch_core::types::{DocumentView, ScoredDocument};
use docsearch_core::{Error, OperationError, OperationTimer, Strategy};

use crate::retrieval::{RetrievalEngine, VectorMode};
use crate::validate_query;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the question using only the provided context. If the context does not contain the answer, say so.";

pub const NO_DOCUMENTS_ANSWER: &str = "I could not find any documents to answer your question.";

/// Concatenates ranked documents into the prompt context, one block per document.
pub fn build_context(documents: &[ScoredDocument]) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, sd)| format!("Document {} (Title: {}):\n{}\n", i + 1, sd.document.title, sd.document.body))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub question: &'a str,
    pub max_context_docs: usize,
    pub system_prompt: Option<&'a str>,
    /// Overrides the configured generation timeout for this call.
    pub timeout: Option<Duration>,
}

pub struct RagOrchestrator {
    retrieval: Arc<RetrievalEngine>,
    generator: Arc<dyn Generator>,
    system_prompt: String,
    timeout: Duration,
    max_context_docs_cap: usize,
}

impl RagOrchestrator {
    pub fn new(retrieval: Arc<RetrievalEngine>, generator: Arc<dyn Generator>, timeout: Duration, max_context_docs_cap: usize) -> Self {
        Self {
            retrieval,
            generator,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout,
            max_context_docs_cap: max_context_docs_cap.max(1),
        }
    }

    /// Replaces the built-in default system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn generator(&self) -> &Arc<dyn Generator> { &self.generator }

    /// One telemetry record spans retrieval and generation.
    pub async fn answer(&self, request: ChatRequest<'_>) -> Result<ChatAnswer, OperationError> {
        let mut timer = OperationTimer::start(Strategy::VectorNative, request.question).with_limit(request.max_context_docs);
        let outcome = self.run(request, &mut timer).await;
        timer
            .conclude(outcome, |(sources, _, _)| sources.len())
            .map(|((sources, answer, backend), telemetry)| ChatAnswer {
                question: request.question.to_string(),
                answer,
                sources,
                generation_backend_id: backend,
                telemetry,
            })
    }

    async fn run(&self, request: ChatRequest<'_>, timer: &mut OperationTimer) -> Result<(Vec<DocumentView>, String, Option<String>), Error> {
        let question = validate_query(request.question, "question")?;
        if request.max_context_docs == 0 {
            return Err(Error::InvalidQuery("max_context_docs must be positive".into()));
        }
        let k = request.max_context_docs.min(self.max_context_docs_cap);
        if k < request.max_context_docs {
            tracing::debug!(requested = request.max_context_docs, k, "context size clamped");
        }

        let documents = match self.retrieval.run_vector(question, k, VectorMode::Strict, timer).await {
            Ok(docs) => docs,
            Err(Error::VectorSearchUnavailable { index, state }) => return Err(Error::RetrievalUnavailable { index, state }),
            Err(e) => return Err(e),
        };
        if documents.is_empty() {
            tracing::info!("no documents retrieved; answering without generation");
            return Ok((Vec::new(), NO_DOCUMENTS_ANSWER.to_string(), None));
        }

        let context = build_context(&documents);
        let system_prompt = request.system_prompt.filter(|p| !p.trim().is_empty()).unwrap_or(self.system_prompt.as_str());
        let generation = GenerationRequest {
            system_prompt,
            context: &context,
            question,
            timeout: request.timeout.unwrap_or(self.timeout),
        };
        let answer = self.generator.generate(generation).await?;
        let sources = documents.iter().map(|d| d.document.view()).collect();
        Ok((sources, answer, Some(self.generator.backend_id())))
    }
}
