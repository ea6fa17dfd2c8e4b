//! Completion provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Trait for generative answer completion.
///
/// Identical prompts need not produce identical output; determinism comes
/// from caching above this layer, never from the model.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a completion for the prompt.
    ///
    /// Fails with `ProviderUnavailable` on transport errors (retried like
    /// embeddings) and `ContentFiltered` when the provider refuses; the
    /// refusal is a distinct answer state, never silently swallowed.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model identifier in use
    fn model(&self) -> &str;
}
