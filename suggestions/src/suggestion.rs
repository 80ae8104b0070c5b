//! Suggestion documents and their audit trail.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pattern::Severity;

/// Kind of artifact a suggestion asks the downstream generators to produce.
///
/// Inherited from the pattern classification; never decided here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Eval,
    Guardrail,
    Runbook,
}

/// Review status of a suggestion.
///
/// The engine only ever writes `Pending`; reviewers move suggestions to
/// `Approved` or `Rejected` through the status-transition API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SuggestionStatus {
    /// Whether the review workflow allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved) | (Self::Pending, Self::Rejected)
        )
    }
}

impl fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        write!(f, "{name}")
    }
}

/// Reference to one source trace that contributed to a suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRef {
    /// Trace the contributing pattern was extracted from.
    pub trace_id: String,

    /// When the trace was merged into the suggestion.
    pub added_at: DateTime<Utc>,

    /// Similarity against the suggestion at merge time; 1.0 for the
    /// seeding trace.
    pub similarity_score: f32,
}

/// One entry in a suggestion's status audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    /// Status before the transition.
    pub from: SuggestionStatus,

    /// Status after the transition.
    pub to: SuggestionStatus,

    /// Who performed the transition.
    pub actor: String,

    /// Free-form reviewer notes.
    pub notes: Option<String>,

    /// When the transition happened.
    pub changed_at: DateTime<Utc>,
}

/// The deduplicated, reviewable unit representing one underlying issue.
///
/// `source_traces` and `status_history` are append-only: entries are never
/// removed or reordered, and `source_traces` always holds at least the
/// seeding trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    /// Unique identifier, generated at creation.
    pub suggestion_id: String,

    /// Artifact kind for the downstream generators.
    pub kind: SuggestionKind,

    /// Review status.
    pub status: SuggestionStatus,

    /// Severity carried over from the seeding pattern.
    pub severity: Severity,

    /// Embedding of the seeding pattern's text, reused for every
    /// comparison against this suggestion.
    pub embedding: Vec<f32>,

    /// Ordered lineage of contributing traces.
    pub source_traces: Vec<TraceRef>,

    /// Stable identifier shared by everything ever clustered into this
    /// suggestion.
    pub similarity_group_id: String,

    /// Audit log of status transitions.
    pub status_history: Vec<StatusHistoryEntry>,

    /// When the suggestion was created.
    pub created_at: DateTime<Utc>,

    /// When the suggestion was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Suggestion {
    /// Create a pending suggestion seeded with one source trace.
    pub fn new(
        kind: SuggestionKind,
        severity: Severity,
        embedding: Vec<f32>,
        trace_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            suggestion_id: Uuid::new_v4().to_string(),
            kind,
            status: SuggestionStatus::Pending,
            severity,
            embedding,
            source_traces: vec![TraceRef {
                trace_id: trace_id.into(),
                added_at: now,
                similarity_score: 1.0,
            }],
            similarity_group_id: Uuid::new_v4().to_string(),
            status_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a trace reference. Lineage only; status is untouched.
    pub(crate) fn push_trace(&mut self, trace_id: impl Into<String>, similarity_score: f32) {
        let now = Utc::now();
        self.source_traces.push(TraceRef {
            trace_id: trace_id.into(),
            added_at: now,
            similarity_score,
        });
        self.updated_at = now;
    }
}
