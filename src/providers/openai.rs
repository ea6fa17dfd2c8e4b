//! OpenAI-compatible HTTP client for embeddings and completions
//!
//! One shared client implements both provider traits; retrieval and
//! generation calls carry their own timeouts, and transient failures are
//! retried with exponential backoff local to the call.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::ProviderConfig;
use crate::error::{Error, Result};

use super::completion::CompletionProvider;
use super::embedding::EmbeddingProvider;

/// HTTP client for an OpenAI-compatible embeddings/completions API
pub struct OpenAiClient {
    client: Client,
    config: ProviderConfig,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a new client. Per-call timeouts are applied per request, so a
    /// timed-out call is cancelled at the transport instead of lingering.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Retry transient failures with exponential backoff. Non-transient
    /// errors (4xx) fail immediately. The retry budget is local to this call.
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = Duration::from_secs(2u64.pow(attempt));
                    tracing::warn!(
                        "Provider request failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        self.config.max_retries + 1,
                        delay,
                        e
                    );
                    last_error = Some(e);
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::provider_unavailable("openai", "retries exhausted")))
    }

    /// Truncate input to the provider limit, preserving char boundaries
    fn truncate_input<'a>(&self, text: &'a str) -> &'a str {
        let limit = self.config.max_input_chars;
        match text.char_indices().nth(limit) {
            Some((byte_idx, _)) => &text[..byte_idx],
            None => text,
        }
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn map_send_error(err: reqwest::Error) -> Error {
        if err.is_timeout() || err.is_connect() {
            Error::provider_unavailable("openai", err.to_string())
        } else {
            Error::provider_rejected("openai", err.to_string())
        }
    }

    fn map_error_status(status: StatusCode, body: &str) -> Error {
        if status.is_server_error() {
            Error::provider_unavailable("openai", format!("HTTP {}: {}", status, body))
        } else if status == StatusCode::PAYLOAD_TOO_LARGE
            || (status == StatusCode::BAD_REQUEST && body.contains("maximum context length"))
        {
            Error::InputTooLarge(format!("HTTP {}: {}", status, body))
        } else {
            Error::provider_rejected("openai", format!("HTTP {}: {}", status, body))
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.config.base_url);
        let input = self.truncate_input(text).to_string();
        let timeout = Duration::from_secs(self.config.embed_timeout_secs);

        self.retry_request(|| {
            let url = url.clone();
            let input = input.clone();

            async move {
                let request = EmbedRequest {
                    model: &self.config.embed_model,
                    input: &input,
                };

                let response = self
                    .auth(self.client.post(&url))
                    .timeout(timeout)
                    .json(&request)
                    .send()
                    .await
                    .map_err(Self::map_send_error)?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(Self::map_error_status(status, &body));
                }

                let parsed: EmbedResponse = response.json().await.map_err(|e| {
                    Error::provider_rejected("openai", format!("bad embedding response: {}", e))
                })?;

                parsed
                    .data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .ok_or_else(|| Error::provider_rejected("openai", "empty embedding response"))
            }
        })
        .await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.config.base_url);
        match self.auth(self.client.get(&url)).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let timeout = Duration::from_secs(self.config.completion_timeout_secs);

        tracing::debug!("Generating completion with model {}", self.config.completion_model);

        self.retry_request(|| {
            let url = url.clone();
            let prompt = prompt.to_string();

            async move {
                let request = ChatRequest {
                    model: &self.config.completion_model,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: &prompt,
                    }],
                    temperature: self.config.temperature,
                };

                let response = self
                    .auth(self.client.post(&url))
                    .timeout(timeout)
                    .json(&request)
                    .send()
                    .await
                    .map_err(Self::map_send_error)?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    if body.contains("content_filter") || body.contains("content_policy") {
                        return Err(Error::ContentFiltered(format!("HTTP {}", status)));
                    }
                    return Err(Self::map_error_status(status, &body));
                }

                let parsed: ChatResponse = response.json().await.map_err(|e| {
                    Error::provider_rejected("openai", format!("bad completion response: {}", e))
                })?;

                let choice = parsed
                    .choices
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::provider_rejected("openai", "empty completion response"))?;

                if choice.finish_reason.as_deref() == Some("content_filter") {
                    return Err(Error::ContentFiltered(
                        "completion terminated by content filter".to_string(),
                    ));
                }

                choice
                    .message
                    .content
                    .ok_or_else(|| Error::provider_rejected("openai", "completion without content"))
            }
        })
        .await
    }

    async fn health_check(&self) -> Result<bool> {
        EmbeddingProvider::health_check(self).await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.completion_model
    }
}
