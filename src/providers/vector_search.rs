//! Vector search provider trait

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Passage;

/// Upper bound on k for a single search
pub const MAX_TOP_K: usize = 50;

/// One search hit: a passage and its similarity score
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The matched passage
    pub passage: Passage,
    /// Similarity score, higher is more similar
    pub score: f32,
}

/// Trait for nearest-neighbor passage retrieval
#[async_trait]
pub trait VectorSearchProvider: Send + Sync {
    /// Return the top-k passages nearest to the query vector.
    ///
    /// k is clamped to `[1, MAX_TOP_K]`. The result has at most k hits,
    /// sorted descending by score with ties broken ascending by passage id.
    /// Fails with `IndexUnavailable` (transient, retried) or
    /// `DimensionMismatch` (fatal, never retried).
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Check if the index is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Sort hits into the canonical order: descending score, ties ascending
/// by passage id so equal-score results are deterministic.
pub(crate) fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.passage.id.cmp(&b.passage.id))
    });
}
