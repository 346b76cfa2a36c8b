use std::time::Duration;

use thiserror::Error;

use crate::telemetry::{SearchOperation, Strategy};
use crate::types::IndexState;

/// Failure categories reported by a document store adapter.
///
/// Adapters translate backend-specific errors into these so the engine can
/// decide on fallbacks without inspecting error text.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("index '{0}' is absent")]
    IndexAbsent(String),

    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Failure categories reported by a generation backend.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation backend unavailable: {0}")]
    Unavailable(String),

    #[error("generation model '{0}' is not provisioned")]
    ModelMissing(String),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed generation response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Vector search unavailable: index '{index}' is {state}; {}", .state.remediation())]
    VectorSearchUnavailable { index: String, state: IndexState },

    #[error("Retrieval unavailable: index '{index}' is {state}; {}", .state.remediation())]
    RetrievalUnavailable { index: String, state: IndexState },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Store failure during {strategy}: {source}")]
    Store {
        strategy: Strategy,
        #[source]
        source: StoreError,
    },

    #[error("Generation backend unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Generation model '{0}' is not provisioned")]
    ModelMissing(String),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed generation response: {0}")]
    MalformedResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Wraps a [`StoreError`] with the strategy that was being attempted.
    pub fn store(strategy: Strategy) -> impl FnOnce(StoreError) -> Error {
        move |source| Error::Store { strategy, source }
    }

    /// True when the caller, not a backend, caused the failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidQuery(_) | Error::Store { strategy: Strategy::Lexical, source: StoreError::MalformedQuery(_) }
        )
    }
}

impl From<GenerationError> for Error {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Unavailable(m) => Error::GenerationUnavailable(m),
            GenerationError::ModelMissing(m) => Error::ModelMissing(m),
            GenerationError::Timeout(d) => Error::Timeout(d),
            GenerationError::MalformedResponse(m) => Error::MalformedResponse(m),
        }
    }
}

/// An [`Error`] together with the telemetry record of the call that failed.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct OperationError {
    #[source]
    pub error: Error,
    pub telemetry: Box<SearchOperation>,
}

impl OperationError {
    pub fn is_client_error(&self) -> bool { self.error.is_client_error() }
}

pub type Result<T> = std::result::Result<T, Error>;
