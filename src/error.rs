//! Error types for the answering pipeline and feedback store

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the answering pipeline and its collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Query was empty after normalization
    #[error("Query is empty")]
    EmptyQuery,

    /// Input exceeds the provider limit even after truncation
    #[error("Input too large: {0}")]
    InputTooLarge(String),

    /// Embedding/completion provider unreachable or failing
    ///
    /// `transient` marks transport/5xx/timeout failures that may be retried;
    /// auth and other 4xx rejections fail immediately.
    #[error("Provider '{provider}' unavailable: {message}")]
    ProviderUnavailable {
        provider: String,
        message: String,
        transient: bool,
    },

    /// Vector index unreachable or failing (transient, retried)
    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// Query vector dimensionality disagrees with the index schema.
    /// Fatal configuration error, never retried.
    #[error("Embedding dimension mismatch: index expects {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The completion provider refused to answer (content policy)
    #[error("Completion refused by provider: {0}")]
    ContentFiltered(String),

    /// A retrieval stage (embedding or search) failed; no answer produced
    #[error("Answer unavailable ({stage} failed): {message}")]
    AnswerUnavailable {
        stage: &'static str,
        message: String,
        retryable: bool,
    },

    /// Answer generation failed after retrieval succeeded
    #[error("Answer generation failed: {0}")]
    GenerationFailed(String),

    /// Vote references an answer the store has no record of (strict mode)
    #[error("Answer not found: {0}")]
    AnswerNotFound(String),

    /// Feedback store error
    #[error("Feedback store error: {0}")]
    Feedback(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a transient provider error (retried with backoff)
    pub fn provider_unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
            transient: true,
        }
    }

    /// Create a non-transient provider rejection (failed immediately)
    pub fn provider_rejected(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
            transient: false,
        }
    }

    /// Create a feedback store error
    pub fn feedback(message: impl Into<String>) -> Self {
        Self::Feedback(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wrap an embedding/search failure with the causing stage named
    pub fn answer_unavailable(stage: &'static str, source: Error) -> Self {
        Self::AnswerUnavailable {
            stage,
            message: source.to_string(),
            retryable: source.is_transient(),
        }
    }

    /// Whether a bounded retry with backoff is worthwhile
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnavailable { transient: true, .. } | Error::IndexUnavailable(_)
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Feedback(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, retryable) = match &self {
            Error::Config(_) => (StatusCode::BAD_REQUEST, "config_error", false),
            Error::EmptyQuery => (StatusCode::BAD_REQUEST, "empty_query", false),
            Error::InputTooLarge(_) => (StatusCode::BAD_REQUEST, "input_too_large", false),
            Error::ProviderUnavailable { transient, .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "provider_unavailable", *transient)
            }
            Error::IndexUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "index_unavailable", true)
            }
            Error::DimensionMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "dimension_mismatch", false)
            }
            Error::ContentFiltered(_) => (StatusCode::OK, "content_filtered", false),
            Error::AnswerUnavailable { retryable, .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "answer_unavailable", *retryable)
            }
            Error::GenerationFailed(_) => {
                (StatusCode::BAD_GATEWAY, "generation_failed", true)
            }
            Error::AnswerNotFound(_) => (StatusCode::NOT_FOUND, "answer_not_found", false),
            Error::Feedback(_) => (StatusCode::INTERNAL_SERVER_ERROR, "feedback_error", false),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error", false),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error", false),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", false),
        };

        let body = Json(json!({
            "error": error_type,
            "message": self.to_string(),
            "retryable": retryable,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(Error::provider_unavailable("openai", "timeout").is_transient());
        assert!(Error::IndexUnavailable("connection refused".into()).is_transient());
    }

    #[test]
    fn client_errors_fail_immediately() {
        assert!(!Error::provider_rejected("openai", "401 unauthorized").is_transient());
        assert!(!Error::InputTooLarge("9000 chars".into()).is_transient());
        assert!(!Error::DimensionMismatch { expected: 1536, got: 768 }.is_transient());
    }

    #[test]
    fn answer_unavailable_names_the_stage() {
        let wrapped = Error::answer_unavailable(
            "embedding",
            Error::provider_unavailable("openai", "HTTP 503"),
        );
        match wrapped {
            Error::AnswerUnavailable { stage, retryable, .. } => {
                assert_eq!(stage, "embedding");
                assert!(retryable);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
