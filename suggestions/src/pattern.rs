//! Failure patterns consumed from the extraction pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::suggestion::SuggestionKind;

/// Severity assigned to a failure by the upstream classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// An extracted, classified description of one production failure.
///
/// Owned by the extraction pipeline. The deduplication engine reads these
/// and flips `processed` once a suggestion exists for the pattern; it never
/// mutates anything else and never deletes a pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePattern {
    /// Unique pattern identifier.
    pub pattern_id: String,

    /// High-level failure classification (e.g. "hallucinated_refund_policy").
    pub failure_type: String,

    /// Description of the condition that triggers the failure.
    pub trigger_condition: String,

    /// Severity assigned by the classifier.
    pub severity: Severity,

    /// Classifier confidence, in [0, 1].
    pub confidence: f32,

    /// Trace the pattern was extracted from.
    pub source_trace_id: String,

    /// Artifact kind the downstream generators should produce.
    pub suggested_kind: SuggestionKind,

    /// True once a suggestion exists for this pattern.
    pub processed: bool,

    /// When the pattern was extracted; drives oldest-first batching.
    pub created_at: DateTime<Utc>,
}

impl FailurePattern {
    /// Create a new unprocessed pattern.
    pub fn new(
        pattern_id: impl Into<String>,
        failure_type: impl Into<String>,
        trigger_condition: impl Into<String>,
        severity: Severity,
        source_trace_id: impl Into<String>,
        suggested_kind: SuggestionKind,
    ) -> Self {
        Self {
            pattern_id: pattern_id.into(),
            failure_type: failure_type.into(),
            trigger_condition: trigger_condition.into(),
            severity,
            confidence: 1.0,
            source_trace_id: source_trace_id.into(),
            suggested_kind,
            processed: false,
            created_at: Utc::now(),
        }
    }

    /// Set the classifier confidence.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// The exact text sent to the embedding provider for this pattern.
    pub fn embedding_text(&self) -> String {
        format!("{}: {}", self.failure_type, self.trigger_condition)
    }
}
