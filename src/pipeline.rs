//! Answer orchestration: one query in, one complete answer out
//!
//! Composes embedding, vector search, context assembly, generation and the
//! response cache. All provider failures are translated at this boundary;
//! no raw transport error crosses it and no partial answer is ever returned.

use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::{CompletionProvider, EmbeddingProvider, VectorSearchProvider, MAX_TOP_K};
use crate::retrieval::assemble;
use crate::types::{Answer, AnswerState};

/// Outcome of one answer request
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub answer: Answer,
    /// Whether the answer was served from the response cache
    pub cached: bool,
}

/// The answering pipeline. Owns the lifecycle of answers and cache entries;
/// providers and cache are injected at construction.
pub struct AnswerPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    searcher: Arc<dyn VectorSearchProvider>,
    completer: Arc<dyn CompletionProvider>,
    cache: Arc<ResponseCache>,
    retrieval: RetrievalConfig,
    model_tag: String,
}

impl AnswerPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        searcher: Arc<dyn VectorSearchProvider>,
        completer: Arc<dyn CompletionProvider>,
        cache: Arc<ResponseCache>,
        retrieval: RetrievalConfig,
        model_tag: String,
    ) -> Self {
        Self {
            embedder,
            searcher,
            completer,
            cache,
            retrieval,
            model_tag,
        }
    }

    /// Answer a question with up to `k` retrieved passages.
    ///
    /// Cache hit returns immediately. On a miss: embed, search, assemble;
    /// an empty context short-circuits to the fixed insufficient-information
    /// answer without calling the completion provider and without caching,
    /// so the query is retried transparently next time.
    pub async fn answer(&self, question: &str, k: Option<usize>) -> Result<AnswerOutcome> {
        let query = question.trim();
        if query.is_empty() {
            return Err(Error::EmptyQuery);
        }
        let k = k.unwrap_or(self.retrieval.top_k).clamp(1, MAX_TOP_K);

        let cache_key = ResponseCache::key(query, &self.model_tag);
        if let Some(answer) = self.cache.get(&cache_key) {
            return Ok(AnswerOutcome {
                answer,
                cached: true,
            });
        }

        let embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| self.stage_failure("embedding", e))?;

        let hits = self
            .searcher
            .search(&embedding, k)
            .await
            .map_err(|e| self.stage_failure("search", e))?;

        let context = assemble(
            &hits,
            self.retrieval.max_context_chars,
            self.retrieval.dedup_threshold,
        );

        if context.is_empty() {
            tracing::info!("No usable context for query, returning fixed answer");
            return Ok(AnswerOutcome {
                answer: Answer::insufficient(query, &self.model_tag),
                cached: false,
            });
        }

        let prompt = PromptBuilder::build_answer_prompt(query, &context);
        let text = match self.completer.complete(&prompt).await {
            Ok(text) => text,
            Err(Error::ContentFiltered(reason)) => {
                // Terminal for this request, surfaced as a distinct answer
                // state rather than an opaque failure. Not cached.
                tracing::warn!("Completion refused: {}", reason);
                return Ok(AnswerOutcome {
                    answer: Answer::filtered(query, reason, &self.model_tag),
                    cached: false,
                });
            }
            Err(e) => return Err(Error::GenerationFailed(e.to_string())),
        };

        let answer = Answer::grounded(
            query,
            text,
            context.passage_ids.clone(),
            &context.fingerprint(),
            &self.model_tag,
        );
        self.cache.put(cache_key, answer.clone());

        Ok(AnswerOutcome {
            answer,
            cached: false,
        })
    }

    /// Model pair tag used in cache keys and answer ids
    pub fn model_tag(&self) -> &str {
        &self.model_tag
    }

    /// Cache handle, for stats reporting
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    fn stage_failure(&self, stage: &'static str, source: Error) -> Error {
        if matches!(source, Error::DimensionMismatch { .. }) {
            tracing::error!("Fatal configuration error in {} stage: {}", stage, source);
        } else {
            tracing::warn!("{} stage failed: {}", stage, source);
        }
        Error::answer_unavailable(stage, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::SearchHit;
    use crate::types::Passage;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::provider_unavailable("fake", "down"));
            }
            Ok(vec![0.1; 4])
        }
        fn dimensions(&self) -> usize {
            4
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
        fn name(&self) -> &str {
            "fake-embedder"
        }
    }

    struct FakeSearcher {
        calls: AtomicUsize,
        hits: Vec<SearchHit>,
    }

    #[async_trait]
    impl VectorSearchProvider for FakeSearcher {
        async fn search(&self, _vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut hits = self.hits.clone();
            hits.truncate(k);
            Ok(hits)
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
        fn name(&self) -> &str {
            "fake-searcher"
        }
    }

    struct FakeCompleter {
        calls: AtomicUsize,
        response: Result<String>,
    }

    impl FakeCompleter {
        fn ok(text: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Ok(text.to_string()),
            }
        }
        fn filtered() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Err(Error::ContentFiltered("policy".to_string())),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for FakeCompleter {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(Error::ContentFiltered(r)) => Err(Error::ContentFiltered(r.clone())),
                Err(e) => Err(Error::Internal(e.to_string())),
            }
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
        fn name(&self) -> &str {
            "fake-completer"
        }
        fn model(&self) -> &str {
            "fake-model"
        }
    }

    fn passage_hits(n: usize) -> Vec<SearchHit> {
        (0..n)
            .map(|i| SearchHit {
                passage: Passage {
                    id: format!("p{}", i),
                    text: format!("Distinct passage number {} about device calibration.", i),
                    source_document: "manual.pdf".to_string(),
                    metadata: HashMap::new(),
                },
                score: 0.9 - i as f32 * 0.1,
            })
            .collect()
    }

    fn pipeline(
        embedder: FakeEmbedder,
        searcher: FakeSearcher,
        completer: FakeCompleter,
    ) -> (AnswerPipeline, Arc<FakeEmbedder>, Arc<FakeSearcher>, Arc<FakeCompleter>) {
        let embedder = Arc::new(embedder);
        let searcher = Arc::new(searcher);
        let completer = Arc::new(completer);
        let cache = Arc::new(ResponseCache::new(100, Duration::from_secs(60)));
        let p = AnswerPipeline::new(
            embedder.clone(),
            searcher.clone(),
            completer.clone(),
            cache,
            RetrievalConfig::default(),
            "embed-v1+gen-v1".to_string(),
        );
        (p, embedder, searcher, completer)
    }

    #[tokio::test]
    async fn empty_retrieval_short_circuits_without_completion() {
        let (p, _, _, completer) = pipeline(
            FakeEmbedder { calls: AtomicUsize::new(0), fail: false },
            FakeSearcher { calls: AtomicUsize::new(0), hits: vec![] },
            FakeCompleter::ok("should not be used"),
        );

        let outcome = p.answer("Is this covered anywhere?", None).await.unwrap();
        assert_eq!(outcome.answer.state, AnswerState::Insufficient);
        assert_eq!(completer.calls.load(Ordering::SeqCst), 0);

        // not cached: the next identical query goes through retrieval again
        let again = p.answer("Is this covered anywhere?", None).await.unwrap();
        assert!(!again.cached);
    }

    #[tokio::test]
    async fn identical_queries_hit_the_cache() {
        let (p, embedder, searcher, completer) = pipeline(
            FakeEmbedder { calls: AtomicUsize::new(0), fail: false },
            FakeSearcher { calls: AtomicUsize::new(0), hits: passage_hits(3) },
            FakeCompleter::ok("Hold reset for five seconds."),
        );

        let first = p.answer("How do I calibrate the device?", None).await.unwrap();
        let second = p.answer("How do I calibrate the device?", None).await.unwrap();

        assert_eq!(first.answer.id, second.answer.id);
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(searcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(completer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sources_are_subset_of_retrieved_ids() {
        let (p, _, _, _) = pipeline(
            FakeEmbedder { calls: AtomicUsize::new(0), fail: false },
            FakeSearcher { calls: AtomicUsize::new(0), hits: passage_hits(5) },
            FakeCompleter::ok("Calibration answer."),
        );

        let outcome = p
            .answer("How do I calibrate the device?", Some(5))
            .await
            .unwrap();
        assert_eq!(outcome.answer.state, AnswerState::Grounded);
        assert!(!outcome.answer.text.is_empty());

        let retrieved: Vec<String> = (0..5).map(|i| format!("p{}", i)).collect();
        assert!(!outcome.answer.source_passage_ids.is_empty());
        for id in &outcome.answer.source_passage_ids {
            assert!(retrieved.contains(id));
        }
    }

    #[tokio::test]
    async fn embedding_failure_names_the_stage() {
        let (p, _, searcher, _) = pipeline(
            FakeEmbedder { calls: AtomicUsize::new(0), fail: true },
            FakeSearcher { calls: AtomicUsize::new(0), hits: passage_hits(2) },
            FakeCompleter::ok("unused"),
        );

        let err = p.answer("anything?", None).await.unwrap_err();
        match err {
            Error::AnswerUnavailable { stage, retryable, .. } => {
                assert_eq!(stage, "embedding");
                assert!(retryable);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(searcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn content_filter_becomes_a_distinct_answer_state() {
        let (p, _, _, _) = pipeline(
            FakeEmbedder { calls: AtomicUsize::new(0), fail: false },
            FakeSearcher { calls: AtomicUsize::new(0), hits: passage_hits(2) },
            FakeCompleter::filtered(),
        );

        let outcome = p.answer("filtered question?", None).await.unwrap();
        assert_eq!(outcome.answer.state, AnswerState::Filtered);

        // refusals are not cached
        let again = p.answer("filtered question?", None).await.unwrap();
        assert!(!again.cached);
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let (p, embedder, _, _) = pipeline(
            FakeEmbedder { calls: AtomicUsize::new(0), fail: false },
            FakeSearcher { calls: AtomicUsize::new(0), hits: vec![] },
            FakeCompleter::ok("unused"),
        );

        let err = p.answer("   ", None).await.unwrap_err();
        assert!(matches!(err, Error::EmptyQuery));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }
}
