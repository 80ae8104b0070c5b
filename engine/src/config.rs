//! Configuration for the deduplication engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use triage_embeddings::RetryPolicy;
use triage_suggestions::PoolFilter;

/// Tunables for batch runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum cosine similarity for a merge. The bound is inclusive: a
    /// best match scoring exactly the threshold merges.
    pub similarity_threshold: f32,

    /// Maximum number of unprocessed patterns fetched per run, which also
    /// bounds the embedding requests issued per run.
    pub batch_size: usize,

    /// Retries per embedding call after the initial attempt.
    pub max_retries: u32,

    /// Backoff before the first retry; doubles on each subsequent retry.
    pub backoff_base: Duration,

    /// Which suggestions are eligible merge targets.
    pub pool_filter: PoolFilter,
}

impl EngineConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the merge threshold.
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the backoff base delay.
    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    /// Set the comparison pool filter.
    pub fn with_pool_filter(mut self, pool_filter: PoolFilter) -> Self {
        self.pool_filter = pool_filter;
        self
    }

    /// Retry schedule derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.backoff_base)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            batch_size: 20,
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            pool_filter: PoolFilter::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.similarity_threshold, 0.85);
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backoff_base, Duration::from_secs(1));
        assert_eq!(config.pool_filter, PoolFilter::Pending);
    }

    #[test]
    fn test_retry_policy_follows_config() {
        let config = EngineConfig::new()
            .with_max_retries(5)
            .with_backoff_base(Duration::from_millis(200));

        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.delay(1), Duration::from_millis(400));
    }
}
