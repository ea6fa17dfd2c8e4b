//! Application state for the answering server

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::ResponseCache;
use crate::config::RagConfig;
use crate::error::Result;
use crate::feedback::FeedbackStore;
use crate::pipeline::AnswerPipeline;
use crate::providers::{
    openai::OpenAiClient, qdrant::QdrantSearcher, CompletionProvider, EmbeddingProvider,
    VectorSearchProvider,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    pipeline: AnswerPipeline,
    feedback: FeedbackStore,
    ready: RwLock<bool>,
}

impl AppState {
    /// Create state with the configured HTTP providers
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing application state...");

        let provider = Arc::new(OpenAiClient::new(&config.provider)?);
        let searcher = Arc::new(QdrantSearcher::new(&config.index, config.provider.dimensions)?);
        tracing::info!(
            "Providers initialized (embed: {}, completion: {}, collection: {})",
            config.provider.embed_model,
            config.provider.completion_model,
            config.index.collection
        );

        Self::with_providers(config, provider.clone(), searcher, provider)
    }

    /// Create state with injected providers. Used by `new` and by tests
    /// that substitute deterministic fakes.
    pub fn with_providers(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        searcher: Arc<dyn VectorSearchProvider>,
        completer: Arc<dyn CompletionProvider>,
    ) -> Result<Self> {
        let cache = Arc::new(ResponseCache::new(
            config.cache.max_entries,
            Duration::from_secs(config.cache.ttl_secs),
        ));
        tracing::info!(
            "Response cache initialized ({} entries, {}s TTL)",
            config.cache.max_entries,
            config.cache.ttl_secs
        );

        let feedback = FeedbackStore::new(
            &config.feedback.db_path,
            config.feedback.require_known_answer,
        )?;
        tracing::info!("Feedback store opened at {}", config.feedback.db_path.display());

        let pipeline = AnswerPipeline::new(
            embedder,
            searcher,
            completer,
            cache,
            config.retrieval.clone(),
            config.model_tag(),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline,
                feedback,
                ready: RwLock::new(true),
            }),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get the answering pipeline
    pub fn pipeline(&self) -> &AnswerPipeline {
        &self.inner.pipeline
    }

    /// Get the feedback store
    pub fn feedback(&self) -> &FeedbackStore {
        &self.inner.feedback
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
