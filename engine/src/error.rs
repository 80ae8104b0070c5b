//! Error types for the deduplication engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while running the deduplication engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] triage_embeddings::EmbeddingError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] triage_suggestions::StoreError),

    /// The pattern queue could not be read; fatal to the run.
    #[error("pattern queue unavailable: {0}")]
    Queue(String),
}
