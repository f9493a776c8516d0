//! Error types for the opinion-dynamics engine.
//!
//! The degraded-mode design keeps external-service failures away from
//! callers: provider errors stop at the backend adapter (empty output) and
//! unparseable model text stops at the opinion parser (bounded-noise
//! fallback). What remains here is real infrastructure failure, chiefly
//! storage I/O, which propagates as typed errors.

use thiserror::Error;

/// Errors from text-generation providers.
///
/// These never cross the [`BackendAdapter`](crate::llm::BackendAdapter)
/// boundary; the adapter logs them and resolves the call to empty output.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure: connection refused, DNS, timeout.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The service answered with a non-success status.
    #[error("API error {code}: {message}")]
    ApiError { code: u16, message: String },

    /// The response body did not match the expected envelope.
    #[error("Failed to parse provider response: {0}")]
    ParseError(String),

    /// The selected backend needs a credential that is not configured.
    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),
}

/// Errors from the per-agent memory store.
///
/// Missing state is not an error: reads on an agent with no records yet
/// resolve to empty collections or sentinels. Only storage I/O fails.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the append-only transcript log.
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from transcript parsing and replay reconstruction.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A transcript line matched a record shape but carried bad values.
    #[error("Malformed transcript at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the conversation orchestrator.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Underlying memory-store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Underlying transcript error.
    #[error("Transcript error: {0}")]
    Transcript(#[from] TranscriptError),
}

/// Result type alias for orchestrator operations.
pub type EngineResult<T> = Result<T, EngineError>;
