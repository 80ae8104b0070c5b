//! # Suggestions
//!
//! Data model and persistence for the suggestion deduplication engine:
//! failure patterns consumed from the extraction pipeline, the canonical
//! suggestion documents the engine produces, and file-backed stores with
//! atomic single-document writes and an append-only audit trail.

pub mod error;
pub mod pattern;
pub mod store;
pub mod suggestion;

pub use error::{Result, StoreError};
pub use pattern::{FailurePattern, Severity};
pub use store::{PatternStore, PoolFilter, SuggestionStore};
pub use suggestion::{
    StatusHistoryEntry, Suggestion, SuggestionKind, SuggestionStatus, TraceRef,
};
