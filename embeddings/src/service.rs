//! Cached, retrying front-end over an embedding provider.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::Embedding;
use crate::cache::EmbeddingCache;
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbedAttempt, EmbeddingProvider, EmbeddingRequest};
use crate::retry::RetryPolicy;

const DEFAULT_CACHE_ENTRIES: usize = 10_000;

/// Composes a provider, a cache, and a retry policy behind one call.
///
/// The backoff loop is plain iteration: each attempt is classified via
/// [`EmbedAttempt`], transient failures sleep per the policy, permanent
/// failures and exhausted retries surface to the caller. A failure here
/// affects only the text being embedded, never a whole batch.
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
    retry: RetryPolicy,
}

impl EmbeddingService {
    /// Create a service with a default-sized cache.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            cache: EmbeddingCache::new(DEFAULT_CACHE_ENTRIES),
            retry,
        }
    }

    /// Replace the cache (e.g. to bound memory differently).
    pub fn with_cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = cache;
        self
    }

    /// The underlying cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Embed `text`, consulting the cache and retrying transient failures.
    pub async fn embed(&self, text: &str) -> Result<Embedding> {
        let model = self.provider.default_model().to_string();

        if let Some(embedding) = self.cache.get(text, &model).await {
            debug!("Embedding cache hit");
            return Ok(embedding);
        }

        let mut last_error: Option<EmbeddingError> = None;

        for attempt in 0..self.retry.attempts() {
            if attempt > 0 {
                let delay = self.retry.delay(attempt - 1);
                debug!("Retrying embedding call in {delay:?} (attempt {attempt})");
                tokio::time::sleep(delay).await;
            }

            let request = EmbeddingRequest::new(text).with_model(&model);
            match EmbedAttempt::classify(self.provider.embed(request).await) {
                EmbedAttempt::Ok(embedding) => {
                    self.cache.put(text, &model, embedding.clone()).await;
                    return Ok(embedding);
                }
                EmbedAttempt::Retryable(err) => {
                    warn!("Transient embedding failure on attempt {attempt}: {err}");
                    last_error = Some(err);
                }
                EmbedAttempt::Fatal(err) => return Err(err),
            }
        }

        let last_error = match last_error {
            Some(err) => err.to_string(),
            None => "unknown".to_string(),
        };
        Err(EmbeddingError::Exhausted {
            attempts: self.retry.attempts(),
            last_error,
        })
    }
}
