//! Batch orchestration.
//!
//! One run works through up to `batch_size` unprocessed patterns, oldest
//! first, each strictly in sequence: embed, decide, persist, mark
//! processed. A failure in any step defers that one pattern to the next
//! cycle; the rest of the batch keeps going.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use triage_embeddings::EmbeddingService;
use triage_suggestions::{
    FailurePattern, PatternStore, StoreError, Suggestion, SuggestionStore,
};

use crate::config::EngineConfig;
use crate::decision::{ComparisonPool, MatchDecision, decide};
use crate::error::{EngineError, Result};

/// Step of per-pattern processing, recorded alongside run errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Embed,
    Decide,
    Persist,
    MarkProcessed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Embed => "embed",
            Self::Decide => "decide",
            Self::Persist => "persist",
            Self::MarkProcessed => "mark_processed",
        };
        write!(f, "{name}")
    }
}

/// A per-pattern failure captured by the run.
///
/// The pattern behind it stays unprocessed and is picked up again by the
/// next cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    /// Pattern that failed.
    pub pattern_id: String,

    /// Step the failure happened in.
    pub stage: Stage,

    /// Error message.
    pub message: String,
}

/// Outcome of one batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Patterns fully processed (merged + created).
    pub patterns_processed: usize,

    /// Patterns folded into an existing suggestion.
    pub merged: usize,

    /// Patterns that spawned a new suggestion.
    pub created: usize,

    /// Mean similarity score across merge decisions.
    pub avg_merge_similarity: Option<f32>,

    /// Per-pattern failures; these patterns stay unprocessed.
    pub errors: Vec<RunError>,

    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
}

impl RunSummary {
    /// Number of patterns deferred by failures.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// How a successfully processed pattern was resolved.
enum PatternOutcome {
    Merged { score: f32 },
    Created,
}

/// A per-pattern failure with the stage it happened in.
struct StageFailure {
    stage: Stage,
    message: String,
}

impl StageFailure {
    fn new(stage: Stage, err: impl fmt::Display) -> Self {
        Self {
            stage,
            message: err.to_string(),
        }
    }
}

/// Drives batch runs of the deduplication engine.
///
/// Processing is single-threaded within a run because each decision must
/// see the suggestions created earlier in the same run. Run-level mutual
/// exclusion across overlapping triggers is the scheduler's job, not ours.
pub struct BatchRunner {
    config: EngineConfig,
    embeddings: EmbeddingService,
    suggestions: SuggestionStore,
    patterns: PatternStore,
}

impl BatchRunner {
    /// Create a runner over the given stores and embedding service.
    pub fn new(
        config: EngineConfig,
        embeddings: EmbeddingService,
        suggestions: SuggestionStore,
        patterns: PatternStore,
    ) -> Self {
        Self {
            config,
            embeddings,
            suggestions,
            patterns,
        }
    }

    /// The suggestion store, for the approval surface and lineage reads.
    pub fn suggestion_store(&self) -> &SuggestionStore {
        &self.suggestions
    }

    /// Mutable access to the suggestion store (status transitions).
    pub fn suggestion_store_mut(&mut self) -> &mut SuggestionStore {
        &mut self.suggestions
    }

    /// The pattern store.
    pub fn pattern_store(&self) -> &PatternStore {
        &self.patterns
    }

    /// Run one batch and return its summary.
    ///
    /// Fatal errors (the pattern queue cannot be read at all) surface as
    /// `Err`; per-pattern failures land in the summary instead.
    pub async fn run_batch(&mut self) -> Result<RunSummary> {
        let run_started = Instant::now();

        self.patterns
            .reload()
            .await
            .map_err(|e| EngineError::Queue(e.to_string()))?;
        let batch = self.patterns.unprocessed(self.config.batch_size);
        info!("Starting batch run over {} patterns", batch.len());

        let pool_snapshot = self.suggestions.list_for_comparison(self.config.pool_filter);
        let mut pool = ComparisonPool::from_suggestions(&pool_snapshot);

        let mut summary = RunSummary::default();
        let mut merge_scores: Vec<f32> = Vec::new();

        for pattern in &batch {
            match self.process_pattern(pattern, &mut pool).await {
                Ok(PatternOutcome::Merged { score }) => {
                    summary.patterns_processed += 1;
                    summary.merged += 1;
                    merge_scores.push(score);
                }
                Ok(PatternOutcome::Created) => {
                    summary.patterns_processed += 1;
                    summary.created += 1;
                }
                Err(failure) => {
                    warn!(
                        "Pattern {} deferred at {}: {}",
                        pattern.pattern_id, failure.stage, failure.message
                    );
                    summary.errors.push(RunError {
                        pattern_id: pattern.pattern_id.clone(),
                        stage: failure.stage,
                        message: failure.message,
                    });
                }
            }
        }

        if !merge_scores.is_empty() {
            summary.avg_merge_similarity =
                Some(merge_scores.iter().sum::<f32>() / merge_scores.len() as f32);
        }
        summary.duration_ms = run_started.elapsed().as_millis() as u64;

        info!(
            "Batch run finished: {} processed ({} merged, {} created), {} deferred",
            summary.patterns_processed,
            summary.merged,
            summary.created,
            summary.error_count()
        );

        Ok(summary)
    }

    /// Process one pattern through embed -> decide -> persist -> mark.
    ///
    /// Nothing is written for the pattern until its embedding has fully
    /// succeeded, and the pattern is only marked processed after its
    /// suggestion write landed, so an abort between patterns leaves no
    /// partial state behind.
    async fn process_pattern(
        &mut self,
        pattern: &FailurePattern,
        pool: &mut ComparisonPool,
    ) -> std::result::Result<PatternOutcome, StageFailure> {
        let embedding = self
            .embeddings
            .embed(&pattern.embedding_text())
            .await
            .map_err(|e| StageFailure::new(Stage::Embed, e))?;

        let decision = decide(&embedding, pool, self.config.similarity_threshold)
            .map_err(|e| StageFailure::new(Stage::Decide, e))?;

        let outcome = match decision {
            MatchDecision::Merge {
                suggestion_id,
                score,
            } => {
                match self
                    .suggestions
                    .merge_into(&suggestion_id, &pattern.source_trace_id, score)
                    .await
                {
                    Ok(_) => {
                        debug!(
                            "Merged pattern {} into suggestion {suggestion_id} (score {score})",
                            pattern.pattern_id
                        );
                        PatternOutcome::Merged { score }
                    }
                    Err(StoreError::NotFound(_)) => {
                        // The merge target vanished between decision and
                        // persist. Dropping the pattern would lose data, so
                        // fall back to creating a fresh suggestion.
                        warn!(
                            "Merge target {suggestion_id} vanished, creating new suggestion for pattern {}",
                            pattern.pattern_id
                        );
                        pool.remove(&suggestion_id);
                        self.create_suggestion(pattern, embedding, pool).await?
                    }
                    Err(err) => return Err(StageFailure::new(Stage::Persist, err)),
                }
            }
            MatchDecision::Create => self.create_suggestion(pattern, embedding, pool).await?,
        };

        self.patterns
            .mark_processed(&pattern.pattern_id)
            .await
            .map_err(|e| StageFailure::new(Stage::MarkProcessed, e))?;

        Ok(outcome)
    }

    async fn create_suggestion(
        &mut self,
        pattern: &FailurePattern,
        embedding: Vec<f32>,
        pool: &mut ComparisonPool,
    ) -> std::result::Result<PatternOutcome, StageFailure> {
        let draft = Suggestion::new(
            pattern.suggested_kind,
            pattern.severity,
            embedding,
            &pattern.source_trace_id,
        );

        let created = self
            .suggestions
            .create(draft)
            .await
            .map_err(|e| StageFailure::new(Stage::Persist, e))?;

        debug!(
            "Created suggestion {} for pattern {}",
            created.suggestion_id, pattern.pattern_id
        );
        pool.push(&created);

        Ok(PatternOutcome::Created)
    }
}
