//! Response envelopes. Each carries exactly one [`SearchOperation`], never one per item.

use serde::{Deserialize, Serialize};

use crate::telemetry::SearchOperation;
use crate::types::{DocumentView, IndexState, ScoredView};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<ScoredView>,
    pub total: usize,
    pub telemetry: SearchOperation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentList {
    pub documents: Vec<DocumentView>,
    pub total: usize,
    pub telemetry: SearchOperation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatAnswer {
    pub question: String,
    pub answer: String,
    pub sources: Vec<DocumentView>,
    /// `None` when no generation call was made.
    pub generation_backend_id: Option<String>,
    pub telemetry: SearchOperation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestReceipt {
    pub document: DocumentView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_language: Option<String>,
    pub telemetry: SearchOperation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every capability is queryable.
    Ok,
    /// The store answers but an index or the generation backend is not ready.
    Degraded,
    /// The store itself cannot be reached.
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationHealth {
    pub backend_id: String,
    pub reachable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub text_index: Option<IndexState>,
    pub vector_index: Option<IndexState>,
    pub document_count: Option<usize>,
    pub embedding_dim: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_error: Option<String>,
    pub generation: GenerationHealth,
    pub telemetry: SearchOperation,
}
