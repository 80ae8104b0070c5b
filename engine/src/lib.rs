//! # Engine
//!
//! The suggestion deduplication engine: for every newly observed failure
//! pattern, decide whether it is an already-known issue (merge into the
//! best-matching suggestion) or a new one (create a suggestion), then
//! persist the outcome with full lineage.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Batch Runner                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  PatternStore ──► EmbeddingService ──► MatchDecision            │
//! │       │                  │                  │                   │
//! │       ▼                  ▼                  ▼                   │
//! │  mark_processed     ComparisonPool    SuggestionStore           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Patterns are processed strictly sequentially within a run: every
//! decision sees the suggestions created earlier in the same batch, which
//! is what lets two near-duplicates arriving back-to-back collapse into
//! one suggestion. Determinism over throughput.

pub mod config;
pub mod decision;
pub mod error;
pub mod runner;

pub use config::EngineConfig;
pub use decision::{ComparisonPool, MatchDecision, decide};
pub use error::{EngineError, Result};
pub use runner::{BatchRunner, RunError, RunSummary, Stage};
