#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use docsearch_core::config::Settings;
use docsearch_core::similarity::rank_by_similarity;
use docsearch_core::traits::{DocumentStore, Embedder, GenerationRequest, Generator, Transcriber};
use docsearch_core::types::{
    Document, DocumentDraft, DocumentId, IndexState, NewDocument, ScoredDocument, SortOrder, Transcript,
};
use docsearch_core::{GenerationError, StoreError};
use docsearch_embed::FakeEmbedder;
use docsearch_engine::{Collaborators, SearchService};
use docsearch_text::baseline::rank_by_keywords;

pub const DIM: usize = 64;

/// In-memory store with a configurable vector index state and per-method call counts.
pub struct MemoryStore {
    pub docs: Mutex<Vec<Document>>,
    pub vector_state: Mutex<IndexState>,
    pub text_present: bool,
    pub probe_error: bool,
    pub calls: AtomicUsize,
    pub native_calls: AtomicUsize,
    pub scan_calls: AtomicUsize,
    pub last_candidates: AtomicUsize,
}

impl MemoryStore {
    pub fn new(vector_state: IndexState, text_present: bool) -> Self {
        Self {
            docs: Mutex::new(Vec::new()),
            vector_state: Mutex::new(vector_state),
            text_present,
            probe_error: false,
            calls: AtomicUsize::new(0),
            native_calls: AtomicUsize::new(0),
            scan_calls: AtomicUsize::new(0),
            last_candidates: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    pub fn seed(&self, embedder: &dyn Embedder, docs: &[(&str, &str)]) {
        let mut stored = self.docs.lock().unwrap();
        for (title, body) in docs {
            let draft = DocumentDraft::new(*title, *body);
            let emb = embedder.embed(&draft.embedding_text()).unwrap();
            let id = format!("doc{:02}", stored.len());
            stored.push(draft.with_embedding(Some(emb)).into_document(id));
        }
    }

    pub fn seed_without_embeddings(&self, docs: &[(&str, &str)]) {
        let mut stored = self.docs.lock().unwrap();
        for (title, body) in docs {
            let id = format!("doc{:02}", stored.len());
            stored.push(DocumentDraft::new(*title, *body).with_embedding(None).into_document(id));
        }
    }

    fn touch(&self) { self.calls.fetch_add(1, Ordering::SeqCst); }

    fn snapshot(&self) -> Vec<Document> { self.docs.lock().unwrap().clone() }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, doc: NewDocument) -> Result<DocumentId, StoreError> {
        self.touch();
        let mut docs = self.docs.lock().unwrap();
        let id = format!("doc{:02}", docs.len());
        docs.push(doc.into_document(id.clone()));
        Ok(id)
    }

    async fn list(&self, limit: usize, order: SortOrder) -> Result<Vec<Document>, StoreError> {
        self.touch();
        let docs = self.snapshot();
        Ok(match order {
            SortOrder::OldestFirst => docs.into_iter().take(limit).collect(),
            SortOrder::NewestFirst => docs.into_iter().rev().take(limit).collect(),
        })
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.touch();
        Ok(self.docs.lock().unwrap().len())
    }

    async fn lexical_search(&self, query: &str, limit: usize) -> Result<Vec<ScoredDocument>, StoreError> {
        self.touch();
        if !self.text_present {
            return Err(StoreError::IndexAbsent("text".into()));
        }
        if query.split_whitespace().all(|t| t.contains(':')) {
            return Err(StoreError::MalformedQuery(query.into()));
        }
        Ok(rank_by_keywords(query, self.snapshot(), limit))
    }

    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<ScoredDocument>, StoreError> {
        self.touch();
        Ok(rank_by_keywords(query, self.snapshot(), limit))
    }

    async fn vector_search(&self, vector: &[f32], k: usize, candidates: usize) -> Result<Vec<ScoredDocument>, StoreError> {
        self.touch();
        self.native_calls.fetch_add(1, Ordering::SeqCst);
        self.last_candidates.store(candidates, Ordering::SeqCst);
        Ok(rank_by_similarity(vector, self.snapshot(), k))
    }

    async fn scan_with_vectors(&self) -> Result<Vec<Document>, StoreError> {
        self.touch();
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot().into_iter().filter(Document::has_embedding).collect())
    }

    async fn capability_probe(&self, index_name: &str) -> Result<IndexState, StoreError> {
        self.touch();
        if self.probe_error {
            return Err(StoreError::Connection("probe refused".into()));
        }
        if index_name == "text" {
            return Ok(if self.text_present { IndexState::Present } else { IndexState::Absent });
        }
        Ok(*self.vector_state.lock().unwrap())
    }
}

/// Fake embedder that counts calls and can be told to fail.
pub struct CountingEmbedder {
    inner: FakeEmbedder,
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl CountingEmbedder {
    pub fn new() -> Self { Self { inner: FakeEmbedder::new(DIM), calls: AtomicUsize::new(0), fail: false } }
    pub fn failing() -> Self { Self { fail: true, ..Self::new() } }
    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl Embedder for CountingEmbedder {
    fn dim(&self) -> usize { DIM }
    fn max_len(&self) -> usize { 256 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("model exploded");
        }
        self.inner.embed_batch(texts)
    }
}

#[derive(Debug, Clone)]
pub struct RecordedGeneration {
    pub system_prompt: String,
    pub context: String,
    pub question: String,
    pub timeout: std::time::Duration,
}

pub enum GeneratorBehavior {
    Answer(String),
    Timeout,
    ModelMissing,
}

pub struct CountingGenerator {
    pub behavior: GeneratorBehavior,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<RecordedGeneration>>,
    pub reachable: bool,
}

impl CountingGenerator {
    pub fn answering(text: &str) -> Self {
        Self { behavior: GeneratorBehavior::Answer(text.into()), calls: AtomicUsize::new(0), requests: Mutex::new(Vec::new()), reachable: true }
    }
    pub fn with(behavior: GeneratorBehavior) -> Self { Self { behavior, ..Self::answering("") } }
    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl Generator for CountingGenerator {
    fn backend_id(&self) -> String { "test:echo".into() }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(RecordedGeneration {
            system_prompt: request.system_prompt.into(),
            context: request.context.into(),
            question: request.question.into(),
            timeout: request.timeout,
        });
        match &self.behavior {
            GeneratorBehavior::Answer(a) => Ok(a.clone()),
            GeneratorBehavior::Timeout => Err(GenerationError::Timeout(request.timeout)),
            GeneratorBehavior::ModelMissing => Err(GenerationError::ModelMissing("llama3.2".into())),
        }
    }

    async fn ping(&self) -> Result<(), GenerationError> {
        if self.reachable { Ok(()) } else { Err(GenerationError::Unavailable("connection refused".into())) }
    }
}

pub struct FixedTranscriber {
    pub text: String,
    pub language: Option<String>,
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _audio: Vec<u8>, _file_name: &str, _language: Option<&str>) -> anyhow::Result<Transcript> {
        Ok(Transcript { text: self.text.clone(), detected_language: self.language.clone() })
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub embedder: Arc<CountingEmbedder>,
    pub generator: Arc<CountingGenerator>,
    pub service: SearchService,
}

pub fn harness(store: MemoryStore, embedder: CountingEmbedder, generator: CountingGenerator, transcriber: Option<FixedTranscriber>) -> Harness {
    let store = Arc::new(store);
    let embedder = Arc::new(embedder);
    let generator = Arc::new(generator);
    let mut settings = Settings::default();
    settings.embedding.dim = DIM;
    let service = SearchService::new(
        Collaborators {
            store: store.clone(),
            embedder: embedder.clone(),
            generator: generator.clone(),
            transcriber: transcriber.map(|t| Arc::new(t) as Arc<dyn Transcriber>),
        },
        settings,
    );
    Harness { store, embedder, generator, service }
}

pub const CORPUS: &[(&str, &str)] = &[
    ("Starting fires", "dry tinder and a ferro rod start a fire quickly"),
    ("Water filters", "boil water or use a ceramic filter for safe water"),
    ("Fire safety", "keep water nearby whenever the fire is burning"),
    ("Grain storage", "store grain in sealed buckets away from rodents"),
    ("Solar power", "panels charge batteries during the day"),
];
