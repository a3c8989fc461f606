//! Error types for the Argus domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// Errors from a concrete AI adapter (transport, vendor, empty output).
#[derive(Debug, Clone, Error)]
pub enum AiError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Token counting failed: {0}")]
    CountTokens(String),
}

/// Errors from the analyzer pipeline.
///
/// The two classifier failure kinds are deliberately terse; callers map
/// them to HTTP 500 or a mode-dependent sidecar fallback without ever
/// exposing the detail to clients.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalyzerError {
    #[error("AI generate failed")]
    GenerateFailed,

    #[error("malformed AI response")]
    MalformedResponse,

    #[error("failed to encode analysis request: {0}")]
    EncodeRequest(String),
}

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Not found")]
    NotFound,

    #[error("Entropy source failed: {0}")]
    Entropy(String),

    #[error("Incomplete verdict cannot be persisted")]
    IncompleteVerdict,
}
