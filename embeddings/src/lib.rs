//! # Embeddings
//!
//! This crate turns failure-pattern text into dense vectors and scores
//! vector similarity for the suggestion deduplication engine.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to dense vectors via an API provider
//! - **Retry Classification**: Explicit transient-vs-permanent failure outcomes
//! - **Caching**: Bounded in-memory cache of computed embeddings
//! - **Similarity Scoring**: Cosine similarity and deterministic best-match scans
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Embedding Adapter                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingService ──► EmbeddingProvider ──► EmbedAttempt        │
//! │       │                     │                    │              │
//! │       ▼                     ▼                    ▼              │
//! │  EmbeddingCache        OpenAiProvider      RetryPolicy          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod provider;
pub mod retry;
pub mod service;
pub mod similarity;

pub use cache::EmbeddingCache;
pub use error::{EmbeddingError, Result};
pub use provider::{
    EmbedAttempt, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAiProvider,
};
pub use retry::RetryPolicy;
pub use service::EmbeddingService;
pub use similarity::{cosine_similarity, find_best_match};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings (varies by model).
pub const DEFAULT_DIMENSION: usize = 1536; // OpenAI text-embedding-3-small
