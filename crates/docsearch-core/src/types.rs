//! Domain types shared by the retrieval engine and its collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type DocumentId = String;
pub type Embedding = Vec<f32>;

/// Number of leading embedding values exposed in a [`DocumentView`].
pub const EMBEDDING_PREVIEW_LEN: usize = 8;

/// How a document entered the corpus.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSource {
    #[default]
    Direct,
    Audio,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    pub source: DocumentSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    pub created_at: DateTime<Utc>,
    /// File path or uploaded audio file name, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl DocumentMetadata {
    pub fn new(source: DocumentSource) -> Self {
        Self { source, detected_language: None, created_at: Utc::now(), origin: None }
    }
}

impl Default for DocumentMetadata {
    fn default() -> Self { Self::new(DocumentSource::Direct) }
}

/// A stored document.
///
/// Deliberately not `Serialize`: callers only ever see a [`DocumentView`],
/// so the full embedding can never leak into a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub embedding: Option<Embedding>,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }

    pub fn view(&self) -> DocumentView {
        DocumentView {
            id: self.id.clone(),
            title: self.title.clone(),
            body: self.body.clone(),
            tags: self.tags.clone(),
            source: self.metadata.source,
            detected_language: self.metadata.detected_language.clone(),
            created_at: self.metadata.created_at,
            embedding_dim: self.embedding.as_ref().map(Vec::len),
            embedding_preview: self
                .embedding
                .as_ref()
                .map(|e| e.iter().take(EMBEDDING_PREVIEW_LEN).copied().collect()),
        }
    }
}

/// A document as submitted by a caller, before the store assigns an id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentDraft {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl DocumentDraft {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self { title: title.into(), body: body.into(), ..Self::default() }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Text fed to the embedding model for this document.
    pub fn embedding_text(&self) -> String {
        if self.title.trim().is_empty() { self.body.clone() } else { format!("{}\n{}", self.title, self.body) }
    }

    pub fn with_embedding(self, embedding: Option<Embedding>) -> NewDocument {
        NewDocument { title: self.title, body: self.body, tags: self.tags, embedding, metadata: self.metadata }
    }
}

/// Insert payload handed to the document store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub embedding: Option<Embedding>,
    pub metadata: DocumentMetadata,
}

impl NewDocument {
    pub fn into_document(self, id: DocumentId) -> Document {
        Document { id, title: self.title, body: self.body, tags: self.tags, embedding: self.embedding, metadata: self.metadata }
    }
}

/// Display-safe projection of a [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentView {
    pub id: DocumentId,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub source: DocumentSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_dim: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_preview: Option<Vec<f32>>,
}

/// One ranked entry of a retrieval result. Higher scores are better.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

impl ScoredDocument {
    pub fn new(document: Document, score: f32) -> Self { Self { document, score } }

    pub fn view(&self) -> ScoredView {
        ScoredView { document: self.document.view(), score: self.score }
    }
}

/// Ordered `(document, score)` pairs, descending by score, ties in store order.
pub type RetrievalResult = Vec<ScoredDocument>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredView {
    pub document: DocumentView,
    pub score: f32,
}

/// Listing order over store insertion order.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Readiness of an optional index, as reported by a capability probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    Present,
    Building,
    Absent,
}

impl IndexState {
    /// `Building` counts as unavailable: the index exists but cannot serve queries yet.
    pub fn is_queryable(self) -> bool { matches!(self, IndexState::Present) }

    pub fn remediation(self) -> &'static str {
        match self {
            IndexState::Present => "no action needed",
            IndexState::Building => "the vector index is still building; retry once it is ready",
            IndexState::Absent => "provision the vector index (docsearch build-index)",
        }
    }
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexState::Present => "present",
            IndexState::Building => "building",
            IndexState::Absent => "absent",
        };
        f.write_str(s)
    }
}

/// Output of the transcription gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
}
