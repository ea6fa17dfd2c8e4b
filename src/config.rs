//! Configuration for the answering service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Embedding/completion provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Vector index configuration
    #[serde(default)]
    pub index: IndexConfig,
    /// Retrieval and context assembly policy
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Response cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Feedback store configuration
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: RagConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.apply_env();
        Ok(config)
    }

    /// Pull secrets from the environment. The API key is an opaque
    /// credential and is never logged.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("RAGSERVE_API_KEY") {
            if !key.is_empty() {
                self.provider.api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var("RAGSERVE_INDEX_API_KEY") {
            if !key.is_empty() {
                self.index.api_key = Some(key);
            }
        }
    }

    /// Tag identifying the deployed model pair. Part of every cache key and
    /// answer id, so a model upgrade invalidates old cache entries.
    pub fn model_tag(&self) -> String {
        format!(
            "{}+{}",
            self.provider.embed_model, self.provider.completion_model
        )
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

/// Embedding/completion provider configuration (OpenAI-compatible API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider base URL
    pub base_url: String,
    /// API key (opaque credential, usually from RAGSERVE_API_KEY)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Embedding model/deployment identifier
    pub embed_model: String,
    /// Completion model/deployment identifier
    pub completion_model: String,
    /// Embedding dimensionality the index was built with
    pub dimensions: usize,
    /// Maximum input length in characters before truncation
    pub max_input_chars: usize,
    /// Temperature for generation
    pub temperature: f32,
    /// Timeout for embedding calls in seconds
    pub embed_timeout_secs: u64,
    /// Timeout for completion calls in seconds
    pub completion_timeout_secs: u64,
    /// Number of retries for transient failures
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            api_key: None,
            embed_model: "text-embedding-3-small".to_string(),
            completion_model: "gpt-4o-mini".to_string(),
            dimensions: 1536,
            max_input_chars: 8000,
            temperature: 0.3,
            embed_timeout_secs: 10,
            completion_timeout_secs: 30,
            max_retries: 2,
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index base URL
    pub base_url: String,
    /// API key for the index (opaque credential)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Collection name
    pub collection: String,
    /// Named vector field within the collection (empty for the default vector)
    #[serde(default)]
    pub vector_field: String,
    /// Timeout for search calls in seconds
    pub timeout_secs: u64,
    /// Number of retries for transient failures
    pub max_retries: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:6333".to_string(),
            api_key: None,
            collection: "passages".to_string(),
            vector_field: String::new(),
            timeout_secs: 10,
            max_retries: 2,
        }
    }
}

/// Retrieval and context assembly policy.
///
/// Token budget and dedup threshold are policy knobs, deliberately
/// configuration rather than constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default number of passages to retrieve
    pub top_k: usize,
    /// Context budget in characters
    pub max_context_chars: usize,
    /// Normalized edit distance below which two passages are near-duplicates
    pub dedup_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_context_chars: 6000,
            dedup_threshold: 0.05,
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached answers
    pub max_entries: usize,
    /// TTL for cache entries in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            ttl_secs: 3600,
        }
    }
}

/// Feedback store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,
    /// Reject votes for answers that were never persisted server-side.
    /// Default is stateless voting: any answer id is accepted.
    pub require_known_answer: bool,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/feedback.db"),
            require_known_answer: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = RagConfig::default();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.provider.embed_timeout_secs, 10);
        assert_eq!(config.provider.completion_timeout_secs, 30);
        assert!(!config.feedback.require_known_answer);
    }

    #[test]
    fn model_tag_combines_both_models() {
        let config = RagConfig::default();
        let tag = config.model_tag();
        assert!(tag.contains(&config.provider.embed_model));
        assert!(tag.contains(&config.provider.completion_model));
    }

    #[test]
    fn parses_partial_toml() {
        let parsed: RagConfig = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000
            enable_cors = false

            [retrieval]
            top_k = 8
            max_context_chars = 4000
            dedup_threshold = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(parsed.server.port, 9000);
        assert_eq!(parsed.retrieval.top_k, 8);
        // untouched sections fall back to defaults
        assert_eq!(parsed.cache.max_entries, 1000);
    }
}
