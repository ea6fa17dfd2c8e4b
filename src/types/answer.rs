//! Passages and answers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Fixed answer text returned when retrieval produced no usable context
pub const INSUFFICIENT_INFORMATION: &str =
    "No relevant information was found in the indexed documents for this question.";

/// A document passage owned by the external index, read-only to the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// Stable passage identifier assigned at indexing time
    pub id: String,
    /// Passage text
    pub text: String,
    /// Source document the passage was extracted from
    #[serde(default)]
    pub source_document: String,
    /// Arbitrary index-side metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// How the answer was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerState {
    /// Generated from retrieved context
    Grounded,
    /// No usable context; the completion provider was never called
    Insufficient,
    /// The completion provider refused the request (content policy)
    Filtered,
}

/// A generated answer. Immutable once produced; the id is a stable hash of
/// query, context and model tag, so identical inputs dedupe to one answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Content-derived identifier
    pub id: String,
    /// Answer text
    pub text: String,
    /// Ids of the passages the answer was grounded on, in context order
    pub source_passage_ids: Vec<String>,
    /// How the answer was produced
    pub state: AnswerState,
    /// Model pair that produced the answer
    pub model_tag: String,
    /// When the answer was generated
    pub created_at: DateTime<Utc>,
}

impl Answer {
    /// Build a grounded answer with a content-derived id
    pub fn grounded(
        question: &str,
        text: String,
        source_passage_ids: Vec<String>,
        context_fingerprint: &str,
        model_tag: &str,
    ) -> Self {
        let id = Self::content_id(question, context_fingerprint, model_tag);
        Self {
            id,
            text,
            source_passage_ids,
            state: AnswerState::Grounded,
            model_tag: model_tag.to_string(),
            created_at: Utc::now(),
        }
    }

    /// The fixed "insufficient information" answer. Never cached, so the
    /// query is retried transparently once the index has relevant content.
    pub fn insufficient(question: &str, model_tag: &str) -> Self {
        let id = Self::content_id(question, "insufficient", model_tag);
        Self {
            id,
            text: INSUFFICIENT_INFORMATION.to_string(),
            source_passage_ids: Vec::new(),
            state: AnswerState::Insufficient,
            model_tag: model_tag.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Answer state for a provider refusal. Terminal for this request.
    pub fn filtered(question: &str, reason: String, model_tag: &str) -> Self {
        let id = Self::content_id(question, "filtered", model_tag);
        Self {
            id,
            text: reason,
            source_passage_ids: Vec::new(),
            state: AnswerState::Filtered,
            model_tag: model_tag.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Deterministic hash of the answer's defining content
    pub fn content_id(question: &str, context_fingerprint: &str, model_tag: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(question.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(context_fingerprint.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(model_tag.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_id_is_stable() {
        let a = Answer::content_id("how do I calibrate?", "fp1", "m1");
        let b = Answer::content_id("how do I calibrate?", "fp1", "m1");
        assert_eq!(a, b);
    }

    #[test]
    fn content_id_varies_with_model_tag() {
        let a = Answer::content_id("q", "fp", "embed-v1+gen-v1");
        let b = Answer::content_id("q", "fp", "embed-v2+gen-v1");
        assert_ne!(a, b);
    }

    #[test]
    fn insufficient_answer_has_no_sources() {
        let answer = Answer::insufficient("anything", "m1");
        assert_eq!(answer.state, AnswerState::Insufficient);
        assert!(answer.source_passage_ids.is_empty());
        assert_eq!(answer.text, INSUFFICIENT_INFORMATION);
    }
}
