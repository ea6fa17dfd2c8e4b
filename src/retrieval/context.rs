//! Bounded context assembly with near-duplicate suppression
//!
//! Pure functions: no provider calls, no shared state. The orchestrator
//! short-circuits on an empty context instead of prompting the model with
//! nothing to ground on.

use sha2::{Digest, Sha256};

use crate::providers::SearchHit;

/// Assembled grounding context for one query
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    /// Formatted context text handed to the prompt builder
    pub text: String,
    /// Ids of the included passages, in inclusion order
    pub passage_ids: Vec<String>,
}

impl Context {
    pub fn is_empty(&self) -> bool {
        self.passage_ids.is_empty()
    }

    /// Deterministic hash of the included passages, used in cache keys and
    /// content-derived answer ids
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for id in &self.passage_ids {
            hasher.update(id.as_bytes());
            hasher.update(b"\x1f");
        }
        hasher.update(self.text.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Greedily assemble a context from hits already sorted by relevance.
///
/// Passages are taken in score order. A passage is skipped when it is a
/// near-duplicate of an already-included one (normalized edit distance below
/// `dedup_threshold`). Assembly stops at the first passage that would push
/// the total past `max_chars`; passages are never split.
pub fn assemble(hits: &[SearchHit], max_chars: usize, dedup_threshold: f64) -> Context {
    let mut text = String::new();
    let mut passage_ids = Vec::new();
    let mut included_texts: Vec<&str> = Vec::new();
    let mut used_chars = 0usize;

    for hit in hits {
        let passage = &hit.passage;
        if passage.text.trim().is_empty() {
            continue;
        }

        let near_duplicate = included_texts
            .iter()
            .any(|prev| normalized_edit_distance(prev, &passage.text) < dedup_threshold);
        if near_duplicate {
            tracing::debug!("Skipping near-duplicate passage {}", passage.id);
            continue;
        }

        let passage_chars = passage.text.chars().count();
        if used_chars + passage_chars > max_chars {
            break;
        }

        // number by inclusion, so skipped passages leave no gaps
        text.push_str(&format!(
            "[{}] {}\n\n{}\n\n---\n\n",
            passage_ids.len() + 1,
            passage.source_document,
            passage.text
        ));
        used_chars += passage_chars;
        included_texts.push(&passage.text);
        passage_ids.push(passage.id.clone());
    }

    Context { text, passage_ids }
}

/// Levenshtein distance normalized by the longer length, in [0, 1].
/// 0 means identical, 1 means nothing in common.
pub fn normalized_edit_distance(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 0.0;
    }
    levenshtein(&a, &b) as f64 / max_len as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
