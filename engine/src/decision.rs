//! Merge-or-create decision policy.
//!
//! The comparison pool is an explicit value owned by one run: snapshotted
//! from the store when the run starts and grown in memory as the run
//! creates suggestions. Nothing here outlives the run, so repeated runs
//! over the same data reproduce the same decisions.

use triage_embeddings::{Embedding, find_best_match};
use triage_suggestions::Suggestion;

use crate::error::Result;

/// Snapshot of the suggestions a new pattern is compared against.
///
/// Entries stay in `created_at` ascending order: the snapshot arrives
/// sorted from the store, and in-run additions are strictly newer than
/// everything before them. That ordering is the tie-breaker when two
/// suggestions score identically.
#[derive(Debug, Default)]
pub struct ComparisonPool {
    entries: Vec<(String, Embedding)>,
}

impl ComparisonPool {
    /// Build a pool from the store's comparison listing.
    pub fn from_suggestions(suggestions: &[Suggestion]) -> Self {
        Self {
            entries: suggestions
                .iter()
                .map(|s| (s.suggestion_id.clone(), s.embedding.clone()))
                .collect(),
        }
    }

    /// Add a suggestion created during the current run.
    pub fn push(&mut self, suggestion: &Suggestion) {
        self.entries
            .push((suggestion.suggestion_id.clone(), suggestion.embedding.clone()));
    }

    /// Drop a suggestion that vanished out-of-band mid-run.
    pub fn remove(&mut self, suggestion_id: &str) {
        self.entries.retain(|(id, _)| id != suggestion_id);
    }

    /// Number of candidate suggestions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entries(&self) -> &[(String, Embedding)] {
        &self.entries
    }
}

/// Terminal outcome of the match decision for one pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchDecision {
    /// Fold the pattern into an existing suggestion.
    Merge { suggestion_id: String, score: f32 },

    /// The pattern is a new issue.
    Create,
}

/// Decide whether `candidate` merges into the pool or spawns a suggestion.
///
/// The threshold is inclusive: a best match scoring exactly `threshold`
/// merges. An empty pool always creates.
pub fn decide(candidate: &[f32], pool: &ComparisonPool, threshold: f32) -> Result<MatchDecision> {
    match find_best_match(candidate, pool.entries())? {
        Some((suggestion_id, score)) if score >= threshold => Ok(MatchDecision::Merge {
            suggestion_id,
            score,
        }),
        _ => Ok(MatchDecision::Create),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use triage_suggestions::{Severity, SuggestionKind};

    fn suggestion_with(embedding: Vec<f32>) -> Suggestion {
        Suggestion::new(SuggestionKind::Eval, Severity::Medium, embedding, "trace")
    }

    #[test]
    fn test_empty_pool_creates() {
        let pool = ComparisonPool::default();
        let decision = decide(&[1.0, 0.0], &pool, 0.85).unwrap();
        assert_eq!(decision, MatchDecision::Create);
    }

    #[test]
    fn test_below_threshold_creates() {
        let existing = suggestion_with(vec![0.0, 1.0]);
        let pool = ComparisonPool::from_suggestions(std::slice::from_ref(&existing));

        let decision = decide(&[1.0, 0.0], &pool, 0.85).unwrap();
        assert_eq!(decision, MatchDecision::Create);
    }

    #[test]
    fn test_above_threshold_merges() {
        let existing = suggestion_with(vec![1.0, 0.0]);
        let pool = ComparisonPool::from_suggestions(std::slice::from_ref(&existing));

        let decision = decide(&[1.0, 0.05], &pool, 0.85).unwrap();
        match decision {
            MatchDecision::Merge {
                suggestion_id,
                score,
            } => {
                assert_eq!(suggestion_id, existing.suggestion_id);
                assert!(score > 0.99);
            }
            MatchDecision::Create => panic!("expected merge"),
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // Identical directions score exactly 1.0; a threshold of exactly
        // 1.0 must still merge.
        let existing = suggestion_with(vec![3.0, 4.0]);
        let pool = ComparisonPool::from_suggestions(std::slice::from_ref(&existing));

        let decision = decide(&[3.0, 4.0], &pool, 1.0).unwrap();
        assert!(matches!(decision, MatchDecision::Merge { score, .. } if score == 1.0));
    }

    #[test]
    fn test_threshold_is_inclusive_at_non_unit_score() {
        // cos([3,4],[4,3]) = 24/25: dot and magnitudes are exact in f32,
        // so the score lands exactly on a 0.96 threshold and must merge.
        let existing = suggestion_with(vec![4.0, 3.0]);
        let pool = ComparisonPool::from_suggestions(std::slice::from_ref(&existing));

        let decision = decide(&[3.0, 4.0], &pool, 0.96).unwrap();
        assert!(matches!(decision, MatchDecision::Merge { .. }));

        // Nudge the threshold past the score and the same pair creates.
        let decision = decide(&[3.0, 4.0], &pool, 0.9601).unwrap();
        assert_eq!(decision, MatchDecision::Create);
    }

    #[test]
    fn test_tie_breaks_to_earliest_pool_entry() {
        let first = suggestion_with(vec![3.0, 4.0]);
        let second = suggestion_with(vec![6.0, 8.0]);
        let pool = ComparisonPool::from_suggestions(&[first.clone(), second]);

        let decision = decide(&[3.0, 4.0], &pool, 0.85).unwrap();
        assert!(matches!(
            decision,
            MatchDecision::Merge { suggestion_id, .. } if suggestion_id == first.suggestion_id
        ));
    }

    #[test]
    fn test_pool_grows_within_run() {
        let mut pool = ComparisonPool::default();
        assert!(pool.is_empty());

        let created = suggestion_with(vec![1.0, 0.0]);
        pool.push(&created);
        assert_eq!(pool.len(), 1);

        let decision = decide(&[1.0, 0.0], &pool, 0.85).unwrap();
        assert!(matches!(decision, MatchDecision::Merge { .. }));
    }

    #[test]
    fn test_remove_drops_entry() {
        let existing = suggestion_with(vec![1.0, 0.0]);
        let mut pool = ComparisonPool::from_suggestions(std::slice::from_ref(&existing));

        pool.remove(&existing.suggestion_id);
        assert!(pool.is_empty());
    }
}
