//! Embedding provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Trait for turning text into a fixed-length vector
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate the embedding for a single text.
    ///
    /// Input is truncated to the provider limit before the call. Fails with
    /// `ProviderUnavailable` on transport/auth errors (transient ones retried
    /// up to the configured bound) and `InputTooLarge` when truncation still
    /// exceeds the limit.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding dimensionality (provider-defined, fixed per model)
    fn dimensions(&self) -> usize;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
