//! Crate-wide error taxonomy (spec.md §7).
//!
//! Mirrors the teacher's `BioMcpError`: one `thiserror` enum, structured
//! variants for domain-specific failures, transparent wrapping for
//! transport/serialization errors. Library code propagates with `?`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// One Search Provider failed. Always caught at the Dispatcher boundary
    /// and attached to `SearchBatch.errors`; this variant exists for
    /// providers to report failures to the dispatcher, not to escape it.
    #[error("search provider {provider} failed: {kind:?}: {message}")]
    Search {
        provider: String,
        kind: SearchErrorKind,
        message: String,
    },

    /// The Judge model returned malformed or missing output after exhausting
    /// its retry budget.
    #[error("judge returned malformed assessment: {0}")]
    Judge(String),

    /// Transport or status error from the chat backend.
    #[error("chat backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Paid backend billing limit or free-tier quota exhausted.
    #[error("chat backend quota exhausted: {0}")]
    QuotaExhausted(String),

    /// The embedding capability is unavailable.
    #[error("embedding backend unavailable: {0}")]
    Embedding(String),

    /// A required setting was missing or out of range at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Both normal and fallback synthesis attempts failed.
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// A caller passed an invalid argument (not part of spec.md's taxonomy,
    /// but needed at API boundaries the way the teacher uses
    /// `BioMcpError::InvalidArgument`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http middleware error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    #[error("invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchErrorKind {
    RateLimit,
    UpstreamUnavailable,
    Timeout,
    ProtocolError,
}

impl CoreError {
    /// True for errors the §7 propagation policy says should trigger a
    /// retry at the call site rather than an immediate forced/fallback
    /// branch (e.g. a single `BackendUnavailable` before the retry budget
    /// is exhausted).
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::BackendUnavailable(_) | CoreError::Judge(_))
    }
}
