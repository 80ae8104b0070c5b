//! File-backed stores for patterns and suggestions.
//!
//! Each record is one JSON document under the store root. Writes go
//! through a temp file and an atomic rename, so a concurrent reader never
//! observes a partially written document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::pattern::FailurePattern;
use crate::suggestion::{StatusHistoryEntry, Suggestion, SuggestionStatus};

/// Which suggestions participate in the merge comparison pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolFilter {
    /// Only suggestions still awaiting review. Recurrences of reviewed
    /// issues spawn fresh pending suggestions.
    Pending,

    /// Every suggestion, including approved and rejected ones. Merges
    /// into a closed suggestion append lineage without touching status.
    All,
}

/// Atomically write a JSON document.
async fn write_doc<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, &content).await?;
    fs::rename(&temp_path, &path).await?;

    Ok(())
}

/// Persistent repository of suggestion documents.
pub struct SuggestionStore {
    /// Root directory for suggestion documents.
    root: PathBuf,

    /// In-memory cache of suggestions.
    cache: HashMap<String, Suggestion>,
}

impl SuggestionStore {
    /// Open a store at the given root directory, loading existing documents.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;

        let mut store = Self {
            root,
            cache: HashMap::new(),
        };
        store.load_all().await?;

        Ok(store)
    }

    fn doc_path(&self, suggestion_id: &str) -> PathBuf {
        self.root.join(format!("{suggestion_id}.json"))
    }

    async fn load_all(&mut self) -> Result<()> {
        self.cache.clear();

        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str::<Suggestion>(&content) {
                    Ok(suggestion) => {
                        self.cache
                            .insert(suggestion.suggestion_id.clone(), suggestion);
                    }
                    Err(e) => warn!("Skipping unreadable suggestion {}: {e}", path.display()),
                },
                Err(e) => warn!("Skipping unreadable suggestion {}: {e}", path.display()),
            }
        }

        info!("Loaded {} suggestions", self.cache.len());
        Ok(())
    }

    /// Get a suggestion by id.
    pub fn get(&self, suggestion_id: &str) -> Option<&Suggestion> {
        self.cache.get(suggestion_id)
    }

    /// Number of stored suggestions.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Persist a newly created suggestion.
    pub async fn create(&mut self, suggestion: Suggestion) -> Result<Suggestion> {
        if self.cache.contains_key(&suggestion.suggestion_id) {
            return Err(StoreError::Conflict(suggestion.suggestion_id));
        }

        write_doc(&self.doc_path(&suggestion.suggestion_id), &suggestion).await?;
        debug!("Created suggestion {}", suggestion.suggestion_id);
        self.cache
            .insert(suggestion.suggestion_id.clone(), suggestion.clone());

        Ok(suggestion)
    }

    /// Append one trace reference to an existing suggestion.
    ///
    /// Lineage only: status is never touched here. The document is written
    /// in full before the cache is updated, so a failed write leaves the
    /// previous version visible.
    pub async fn merge_into(
        &mut self,
        suggestion_id: &str,
        trace_id: &str,
        similarity_score: f32,
    ) -> Result<Suggestion> {
        let mut updated = self
            .cache
            .get(suggestion_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(suggestion_id.to_string()))?;

        updated.push_trace(trace_id, similarity_score);

        write_doc(&self.doc_path(suggestion_id), &updated).await?;
        debug!("Merged trace {trace_id} into suggestion {suggestion_id} (score {similarity_score})");
        self.cache.insert(suggestion_id.to_string(), updated.clone());

        Ok(updated)
    }

    /// Apply a reviewer's status transition.
    ///
    /// Only `pending -> approved` and `pending -> rejected` are legal;
    /// anything else fails with [`StoreError::InvalidTransition`] and is
    /// never silently coerced. Every transition lands in `status_history`.
    pub async fn update_status(
        &mut self,
        suggestion_id: &str,
        new_status: SuggestionStatus,
        actor: &str,
        notes: Option<String>,
    ) -> Result<Suggestion> {
        let mut updated = self
            .cache
            .get(suggestion_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(suggestion_id.to_string()))?;

        if !updated.status.can_transition_to(new_status) {
            return Err(StoreError::InvalidTransition {
                from: updated.status,
                to: new_status,
            });
        }

        let now = chrono::Utc::now();
        updated.status_history.push(StatusHistoryEntry {
            from: updated.status,
            to: new_status,
            actor: actor.to_string(),
            notes,
            changed_at: now,
        });
        updated.status = new_status;
        updated.updated_at = now;

        write_doc(&self.doc_path(suggestion_id), &updated).await?;
        info!("Suggestion {suggestion_id} moved to {new_status} by {actor}");
        self.cache.insert(suggestion_id.to_string(), updated.clone());

        Ok(updated)
    }

    /// The comparison pool, ordered by `created_at` ascending.
    ///
    /// The ordering (with the id as tie-breaker) is what makes merge
    /// tie-breaking reproducible across runs.
    pub fn list_for_comparison(&self, filter: PoolFilter) -> Vec<Suggestion> {
        let mut pool: Vec<Suggestion> = self
            .cache
            .values()
            .filter(|s| match filter {
                PoolFilter::Pending => s.status == SuggestionStatus::Pending,
                PoolFilter::All => true,
            })
            .cloned()
            .collect();

        pool.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.suggestion_id.cmp(&b.suggestion_id))
        });

        pool
    }
}

/// Read-side view of the extraction pipeline's pattern queue.
///
/// The only mutation this store performs is flipping `processed`; patterns
/// are created upstream and never deleted here.
pub struct PatternStore {
    /// Root directory for pattern documents.
    root: PathBuf,

    /// In-memory cache of patterns.
    cache: HashMap<String, FailurePattern>,
}

impl PatternStore {
    /// Open a store at the given root directory, loading existing documents.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;

        let mut store = Self {
            root,
            cache: HashMap::new(),
        };
        store.reload().await?;

        Ok(store)
    }

    fn doc_path(&self, pattern_id: &str) -> PathBuf {
        self.root.join(format!("{pattern_id}.json"))
    }

    /// Re-read every pattern document from disk.
    ///
    /// Called at the start of each batch run so patterns written by the
    /// extraction pipeline since the store was opened become visible.
    pub async fn reload(&mut self) -> Result<()> {
        self.cache.clear();

        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str::<FailurePattern>(&content) {
                    Ok(pattern) => {
                        self.cache.insert(pattern.pattern_id.clone(), pattern);
                    }
                    Err(e) => warn!("Skipping unreadable pattern {}: {e}", path.display()),
                },
                Err(e) => warn!("Skipping unreadable pattern {}: {e}", path.display()),
            }
        }

        debug!("Loaded {} patterns", self.cache.len());
        Ok(())
    }

    /// Insert or replace a pattern document.
    pub async fn put(&mut self, pattern: FailurePattern) -> Result<()> {
        write_doc(&self.doc_path(&pattern.pattern_id), &pattern).await?;
        self.cache.insert(pattern.pattern_id.clone(), pattern);
        Ok(())
    }

    /// Get a pattern by id.
    pub fn get(&self, pattern_id: &str) -> Option<&FailurePattern> {
        self.cache.get(pattern_id)
    }

    /// Number of stored patterns.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Up to `limit` unprocessed patterns, oldest first.
    pub fn unprocessed(&self, limit: usize) -> Vec<FailurePattern> {
        let mut pending: Vec<FailurePattern> = self
            .cache
            .values()
            .filter(|p| !p.processed)
            .cloned()
            .collect();

        pending.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.pattern_id.cmp(&b.pattern_id))
        });
        pending.truncate(limit);

        pending
    }

    /// Flip a pattern's `processed` flag to true.
    pub async fn mark_processed(&mut self, pattern_id: &str) -> Result<()> {
        let mut updated = self
            .cache
            .get(pattern_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(pattern_id.to_string()))?;

        updated.processed = true;

        write_doc(&self.doc_path(pattern_id), &updated).await?;
        debug!("Marked pattern {pattern_id} processed");
        self.cache.insert(pattern_id.to_string(), updated);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Severity;
    use crate::suggestion::SuggestionKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample_suggestion(trace_id: &str) -> Suggestion {
        Suggestion::new(
            SuggestionKind::Eval,
            Severity::High,
            vec![1.0, 0.0, 0.0],
            trace_id,
        )
    }

    fn sample_pattern(pattern_id: &str) -> FailurePattern {
        FailurePattern::new(
            pattern_id,
            "tool_timeout",
            "search tool exceeds deadline on long queries",
            Severity::Medium,
            format!("trace-{pattern_id}"),
            SuggestionKind::Runbook,
        )
    }

    #[tokio::test]
    async fn test_create_and_reload() {
        let temp_dir = TempDir::new().unwrap();

        let id;
        {
            let mut store = SuggestionStore::open(temp_dir.path()).await.unwrap();
            let created = store.create(sample_suggestion("trace-1")).await.unwrap();
            id = created.suggestion_id;
        }

        let store = SuggestionStore::open(temp_dir.path()).await.unwrap();
        let loaded = store.get(&id).unwrap();
        assert_eq!(loaded.source_traces.len(), 1);
        assert_eq!(loaded.status, SuggestionStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = SuggestionStore::open(temp_dir.path()).await.unwrap();

        let suggestion = sample_suggestion("trace-1");
        store.create(suggestion.clone()).await.unwrap();

        let err = store.create(suggestion).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_merge_appends_lineage() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = SuggestionStore::open(temp_dir.path()).await.unwrap();

        let created = store.create(sample_suggestion("trace-1")).await.unwrap();
        let merged = store
            .merge_into(&created.suggestion_id, "trace-2", 0.92)
            .await
            .unwrap();

        assert_eq!(merged.source_traces.len(), 2);
        assert_eq!(merged.source_traces[1].trace_id, "trace-2");
        assert_eq!(merged.source_traces[1].similarity_score, 0.92);
        assert_eq!(merged.status, SuggestionStatus::Pending);

        // Lineage survives a reload.
        let store = SuggestionStore::open(temp_dir.path()).await.unwrap();
        assert_eq!(
            store.get(&created.suggestion_id).unwrap().source_traces.len(),
            2
        );
    }

    #[tokio::test]
    async fn test_merge_into_missing_suggestion() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = SuggestionStore::open(temp_dir.path()).await.unwrap();

        let err = store.merge_into("no-such-id", "trace-1", 0.9).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_status_transition_succeeds_exactly_once() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = SuggestionStore::open(temp_dir.path()).await.unwrap();

        let created = store.create(sample_suggestion("trace-1")).await.unwrap();
        let approved = store
            .update_status(
                &created.suggestion_id,
                SuggestionStatus::Approved,
                "reviewer-1",
                Some("looks real".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(approved.status, SuggestionStatus::Approved);
        assert_eq!(approved.status_history.len(), 1);
        assert_eq!(approved.status_history[0].actor, "reviewer-1");
        assert_eq!(approved.status_history[0].from, SuggestionStatus::Pending);

        let err = store
            .update_status(
                &created.suggestion_id,
                SuggestionStatus::Approved,
                "reviewer-2",
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: SuggestionStatus::Approved,
                to: SuggestionStatus::Approved,
            }
        ));
    }

    #[tokio::test]
    async fn test_list_for_comparison_filters_and_orders() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = SuggestionStore::open(temp_dir.path()).await.unwrap();

        let first = store.create(sample_suggestion("trace-1")).await.unwrap();
        let second = store.create(sample_suggestion("trace-2")).await.unwrap();
        store
            .update_status(
                &second.suggestion_id,
                SuggestionStatus::Rejected,
                "reviewer-1",
                None,
            )
            .await
            .unwrap();

        let pending = store.list_for_comparison(PoolFilter::Pending);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].suggestion_id, first.suggestion_id);

        let all = store.list_for_comparison(PoolFilter::All);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].suggestion_id, first.suggestion_id);
        assert_eq!(all[1].suggestion_id, second.suggestion_id);
    }

    #[tokio::test]
    async fn test_unprocessed_is_oldest_first_and_bounded() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = PatternStore::open(temp_dir.path()).await.unwrap();

        for i in 0..5 {
            store.put(sample_pattern(&format!("pat-{i}"))).await.unwrap();
        }
        store.mark_processed("pat-0").await.unwrap();

        let batch = store.unprocessed(3);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].pattern_id, "pat-1");
        assert_eq!(batch[1].pattern_id, "pat-2");
        assert_eq!(batch[2].pattern_id, "pat-3");
    }

    #[tokio::test]
    async fn test_mark_processed_persists() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut store = PatternStore::open(temp_dir.path()).await.unwrap();
            store.put(sample_pattern("pat-1")).await.unwrap();
            store.mark_processed("pat-1").await.unwrap();
        }

        let store = PatternStore::open(temp_dir.path()).await.unwrap();
        assert!(store.get("pat-1").unwrap().processed);
        assert!(store.unprocessed(10).is_empty());
    }

    #[tokio::test]
    async fn test_mark_processed_missing_pattern() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = PatternStore::open(temp_dir.path()).await.unwrap();

        let err = store.mark_processed("no-such-id").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_documents() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = PatternStore::open(temp_dir.path()).await.unwrap();
        assert!(store.is_empty());

        // Another writer (the extraction pipeline) drops a document in.
        {
            let mut writer = PatternStore::open(temp_dir.path()).await.unwrap();
            writer.put(sample_pattern("pat-late")).await.unwrap();
        }

        store.reload().await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
