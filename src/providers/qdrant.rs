//! Qdrant-compatible HTTP client for vector search
//!
//! The index is an external collaborator: passages are owned and indexed
//! elsewhere, this client only reads. Collection and vector field names come
//! from configuration.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::types::Passage;

use super::vector_search::{sort_hits, SearchHit, VectorSearchProvider, MAX_TOP_K};

/// HTTP client for a Qdrant-compatible vector index
pub struct QdrantSearcher {
    client: Client,
    config: IndexConfig,
    /// Dimensionality the index schema expects
    dimensions: usize,
}

#[derive(Serialize)]
struct SearchRequest {
    vector: QueryVector,
    limit: usize,
    with_payload: bool,
}

/// Plain vector for the default field, named form otherwise
#[derive(Serialize)]
#[serde(untagged)]
enum QueryVector {
    Plain(Vec<f32>),
    Named { name: String, vector: Vec<f32> },
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: serde_json::Value,
    score: f32,
    #[serde(default)]
    payload: HashMap<String, serde_json::Value>,
}

impl QdrantSearcher {
    pub fn new(config: &IndexConfig, dimensions: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build index client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
            dimensions,
        })
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    /// 5xx means the index itself is struggling and a retry may succeed; a
    /// 4xx rejection (unknown collection, malformed request) is a deployment
    /// problem that no retry fixes.
    fn map_search_status(status: StatusCode, body: &str) -> Error {
        if status.is_server_error() {
            Error::IndexUnavailable(format!("HTTP {}: {}", status, body))
        } else {
            Error::Config(format!("Index rejected search: HTTP {}: {}", status, body))
        }
    }

    fn point_to_hit(point: ScoredPoint) -> SearchHit {
        let id = point
            .payload
            .get("passage_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| match &point.id {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            });

        let text = point
            .payload
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let source_document = point
            .payload
            .get("source_document")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        let metadata = point
            .payload
            .into_iter()
            .filter(|(k, _)| k != "text" && k != "source_document" && k != "passage_id")
            .collect();

        SearchHit {
            passage: Passage {
                id,
                text,
                source_document,
                metadata,
            },
            score: point.score,
        }
    }
}

#[async_trait]
impl VectorSearchProvider for QdrantSearcher {
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if vector.len() != self.dimensions {
            // Configuration error, not retried. Operators need to see this.
            tracing::error!(
                "Query vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            );
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                got: vector.len(),
            });
        }

        let k = k.clamp(1, MAX_TOP_K);
        let url = format!(
            "{}/collections/{}/points/search",
            self.config.base_url, self.config.collection
        );

        let query = if self.config.vector_field.is_empty() {
            QueryVector::Plain(vector.to_vec())
        } else {
            QueryVector::Named {
                name: self.config.vector_field.clone(),
                vector: vector.to_vec(),
            }
        };
        let request = SearchRequest {
            vector: query,
            limit: k,
            with_payload: true,
        };

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            let result = self.try_search(&url, &request).await;
            match result {
                Ok(mut hits) => {
                    sort_hits(&mut hits);
                    hits.truncate(k);
                    return Ok(hits);
                }
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = Duration::from_secs(2u64.pow(attempt));
                    tracing::warn!(
                        "Index search failed (attempt {}/{}), retrying in {:?}: {}",
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

        Err(last_error.unwrap_or_else(|| Error::IndexUnavailable("retries exhausted".into())))
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/collections/{}", self.config.base_url, self.config.collection);
        match self.auth(self.client.get(&url)).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

impl QdrantSearcher {
    async fn try_search(&self, url: &str, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let response = self
            .auth(self.client.post(url))
            .json(request)
            .send()
            .await
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_search_status(status, &body));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::IndexUnavailable(format!("bad search response: {}", e)))?;

        Ok(parsed.result.into_iter().map(Self::point_to_hit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_payload_maps_to_passage() {
        let point = ScoredPoint {
            id: serde_json::json!("p-42"),
            score: 0.87,
            payload: HashMap::from([
                ("text".to_string(), serde_json::json!("calibration steps")),
                ("source_document".to_string(), serde_json::json!("manual.pdf")),
                ("page".to_string(), serde_json::json!(12)),
            ]),
        };

        let hit = QdrantSearcher::point_to_hit(point);
        assert_eq!(hit.passage.id, "p-42");
        assert_eq!(hit.passage.text, "calibration steps");
        assert_eq!(hit.passage.source_document, "manual.pdf");
        assert_eq!(hit.passage.metadata.get("page"), Some(&serde_json::json!(12)));
        assert!((hit.score - 0.87).abs() < f32::EPSILON);
    }

    #[test]
    fn index_server_errors_are_transient() {
        let err = QdrantSearcher::map_search_status(StatusCode::SERVICE_UNAVAILABLE, "busy");
        assert!(matches!(err, Error::IndexUnavailable(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn index_rejections_are_not_retried() {
        let err = QdrantSearcher::map_search_status(StatusCode::BAD_REQUEST, "unknown collection");
        assert!(matches!(err, Error::Config(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_search_failures_retry_with_backoff() {
        let mut config = IndexConfig::default();
        // nothing listens here, every attempt fails at the transport
        config.base_url = "http://127.0.0.1:9".to_string();
        config.max_retries = 2;
        let searcher = QdrantSearcher::new(&config, 4).unwrap();

        let start = tokio::time::Instant::now();
        let err = searcher.search(&[0.0; 4], 3).await.unwrap_err();

        assert!(matches!(err, Error::IndexUnavailable(_)));
        // two backoff sleeps (1s, then 2s) mean three attempts were made
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn dimension_mismatch_is_fatal() {
        let searcher = QdrantSearcher::new(&IndexConfig::default(), 1536).unwrap();
        let err = searcher.search(&[0.0; 768], 5).await.unwrap_err();
        assert!(!err.is_transient());
        match err {
            Error::DimensionMismatch { expected, got } => {
                assert_eq!(expected, 1536);
                assert_eq!(got, 768);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
