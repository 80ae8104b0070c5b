//! Error types for the suggestion stores.

use thiserror::Error;

use crate::suggestion::SuggestionStatus;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while persisting patterns and suggestions.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A record with this id already exists.
    #[error("already exists: {0}")]
    Conflict(String),

    /// Record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Status change violates the review workflow.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: SuggestionStatus,
        to: SuggestionStatus,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
