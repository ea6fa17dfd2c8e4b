//! Answer request types

use serde::{Deserialize, Serialize};

/// Request body for `POST /api/answer`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    /// The question to answer
    pub question: String,

    /// Number of passages to retrieve (default from config, clamped to [1, 50])
    #[serde(default)]
    pub k: Option<usize>,
}

impl AnswerRequest {
    /// Create a new request with the default k
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            k: None,
        }
    }

    /// Set the number of passages to retrieve
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }
}
