//! Error types for the embedding adapter.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur while generating or comparing embeddings.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured.
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// The API answered with a non-success status.
    #[error("api returned status {status}: {message}")]
    ApiStatus { status: u16, message: String },

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Every attempt allowed by the retry policy failed.
    #[error("embedding unavailable after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

impl EmbeddingError {
    /// Whether a retry with backoff can plausibly succeed.
    ///
    /// Throttling and server-side failures are transient; everything else
    /// (bad credentials, malformed requests, mismatched dimensions) will
    /// fail identically on the next attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::ApiStatus { status, .. } => *status >= 500,
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }
}
