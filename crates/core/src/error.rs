//! Error types for the shopchat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator has its own error enum; [`Error`] aggregates them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all shopchat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Retrieval errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Knowledge query failed: {0}")]
    QueryFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Knowledge index unavailable: {0}")]
    IndexUnavailable(String),
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Stored session data is unreadable: {0}")]
    Corrupt(String),
}

/// The semantic outcome classes a turn can fail with.
///
/// The HTTP layer maps these to status codes; the core only defines the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnErrorKind {
    /// The utterance exceeds the configured character limit.
    InputTooLong,
    /// The utterance is missing, not text, or blank.
    MalformedInput,
    /// A collaborator failed while the turn was being handled.
    ServiceUnavailable,
}

impl std::fmt::Display for TurnErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InputTooLong => write!(f, "input_too_long"),
            Self::MalformedInput => write!(f, "malformed_input"),
            Self::ServiceUnavailable => write!(f, "service_unavailable"),
        }
    }
}
