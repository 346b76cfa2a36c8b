//! Per-operation telemetry.
//!
//! Every public retrieval, listing, ingest or generation call owns exactly one
//! [`OperationTimer`]. The timer is consumed when the call finishes, so a
//! [`SearchOperation`] is finalized exactly once whether the call succeeds or
//! fails. Finalized records are also emitted as `tracing` events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::error::{Error, OperationError};
use crate::types::IndexState;

/// The path that produced (or failed to produce) a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Full-text index query.
    Lexical,
    /// Keyword-match scan used when the full-text index is absent.
    LexicalBaseline,
    /// Approximate nearest neighbour query against the vector index.
    VectorNative,
    /// Brute-force cosine ranking over stored embeddings.
    VectorFallback,
    Listing,
    Ingest,
    Health,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::Lexical => "lexical",
            Strategy::LexicalBaseline => "lexical_baseline",
            Strategy::VectorNative => "vector_native",
            Strategy::VectorFallback => "vector_fallback",
            Strategy::Listing => "listing",
            Strategy::Ingest => "ingest",
            Strategy::Health => "health",
        };
        f.write_str(s)
    }
}

/// Telemetry record attached once to each response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchOperation {
    pub strategy: Strategy,
    pub query: String,
    pub query_terms: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_limit: Option<usize>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: f64,
    pub result_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_state: Option<IndexState>,
    /// Set when a degraded path produced the result.
    pub fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// In-flight telemetry for one call. Start it before dispatching to a backend.
#[derive(Debug)]
pub struct OperationTimer {
    strategy: Strategy,
    query: String,
    requested_limit: Option<usize>,
    index_state: Option<IndexState>,
    fallback: bool,
    started_at: DateTime<Utc>,
    start: Instant,
}

impl OperationTimer {
    pub fn start(strategy: Strategy, query: &str) -> Self {
        Self {
            strategy,
            query: query.to_string(),
            requested_limit: None,
            index_state: None,
            fallback: false,
            started_at: Utc::now(),
            start: Instant::now(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.requested_limit = Some(limit);
        self
    }

    pub fn set_index_state(&mut self, state: IndexState) { self.index_state = Some(state); }

    /// Switches to a degraded strategy; the final record reports it with `fallback = true`.
    pub fn fall_back_to(&mut self, strategy: Strategy) {
        self.strategy = strategy;
        self.fallback = true;
    }

    /// Finalizes a successful call. `result_count` is what the caller receives.
    pub fn finish(self, result_count: usize) -> SearchOperation {
        let op = self.record(result_count, None);
        if op.fallback {
            tracing::warn!(strategy = %op.strategy, duration_ms = op.duration_ms, results = op.result_count,
                index_state = ?op.index_state, "operation served by fallback path");
        } else {
            tracing::info!(strategy = %op.strategy, duration_ms = op.duration_ms, results = op.result_count,
                index_state = ?op.index_state, "operation completed");
        }
        op
    }

    /// Finalizes a failed call.
    pub fn fail(self, error: &Error) -> SearchOperation {
        let op = self.record(0, Some(error.to_string()));
        tracing::warn!(strategy = %op.strategy, duration_ms = op.duration_ms, index_state = ?op.index_state,
            error = %error, "operation failed");
        op
    }

    /// Finalizes from an outcome, pairing the record with the value or the error.
    pub fn conclude<T>(
        self,
        outcome: Result<T, Error>,
        count: impl FnOnce(&T) -> usize,
    ) -> Result<(T, SearchOperation), OperationError> {
        match outcome {
            Ok(value) => {
                let n = count(&value);
                Ok((value, self.finish(n)))
            }
            Err(error) => {
                let telemetry = Box::new(self.fail(&error));
                Err(OperationError { error, telemetry })
            }
        }
    }

    fn record(self, result_count: usize, error: Option<String>) -> SearchOperation {
        SearchOperation {
            strategy: self.strategy,
            query_terms: self.query.split_whitespace().count(),
            query: self.query,
            requested_limit: self.requested_limit,
            started_at: self.started_at,
            duration_ms: self.start.elapsed().as_secs_f64() * 1000.0,
            result_count,
            index_state: self.index_state,
            fallback: self.fallback,
            error,
        }
    }
}
