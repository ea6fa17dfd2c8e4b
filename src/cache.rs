//! Response cache for generated answers
//!
//! Memoizes (cache key -> Answer) to bound provider cost and latency. TTL
//! expiry is checked on read so an expired entry is never returned; LRU
//! eviction on write caps memory. Concurrent fills for one key race
//! last-writer-wins: duplicate generation is wasteful but not unsafe, so
//! there is no single-flight machinery.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::types::Answer;

struct CacheEntry {
    answer: Answer,
    expires_at: Instant,
    last_used: Instant,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    total_hits: u64,
}

/// Bounded TTL+LRU answer cache. Injected into the pipeline at construction,
/// never a hidden singleton.
pub struct ResponseCache {
    inner: RwLock<CacheInner>,
    max_entries: usize,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                entries: HashMap::new(),
                total_hits: 0,
            }),
            max_entries,
            ttl,
        }
    }

    /// Compute the cache key for a normalized query under a model tag.
    /// The tag makes a provider/model upgrade invalidate old entries.
    pub fn key(normalized_query: &str, model_tag: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model_tag.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(normalized_query.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Look up a cached answer. Expired entries are removed, never returned.
    pub fn get(&self, key: &str) -> Option<Answer> {
        let now = Instant::now();
        let mut inner = self.inner.write();

        match inner.entries.get_mut(key) {
            Some(entry) if now < entry.expires_at => {
                entry.last_used = now;
                let answer = entry.answer.clone();
                inner.total_hits += 1;
                tracing::debug!("Cache hit: {}", &key[..12.min(key.len())]);
                Some(answer)
            }
            Some(_) => {
                inner.entries.remove(key);
                tracing::debug!("Cache miss (expired): {}", &key[..12.min(key.len())]);
                None
            }
            None => None,
        }
    }

    /// Store an answer. Evicts the least recently used entry at capacity.
    pub fn put(&self, key: String, answer: Answer) {
        let now = Instant::now();
        let mut inner = self.inner.write();

        if inner.entries.len() >= self.max_entries && !inner.entries.contains_key(&key) {
            if let Some(lru_key) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&lru_key);
            }
        }

        inner.entries.insert(
            key,
            CacheEntry {
                answer,
                expires_at: now + self.ttl,
                last_used: now,
            },
        );
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.inner.write().entries.clear();
    }

    /// Cache statistics
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read();
        CacheStats {
            entries: inner.entries.len(),
            total_hits: inner.total_hits,
            max_entries: self.max_entries,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_hits: u64,
    pub max_entries: usize,
    pub ttl_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(text: &str) -> Answer {
        Answer::grounded("q", text.to_string(), vec!["p1".into()], "fp", "m1")
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.put("k1".to_string(), answer("cached answer"));
        let got = cache.get("k1").expect("entry should be present");
        assert_eq!(got.text, "cached answer");
        assert_eq!(cache.stats().total_hits, 1);
    }

    #[test]
    fn zero_ttl_never_hits() {
        let cache = ResponseCache::new(10, Duration::ZERO);
        cache.put("k1".to_string(), answer("a"));
        assert!(cache.get("k1").is_none());
    }

    #[test]
    fn expired_entries_are_removed_on_read() {
        let cache = ResponseCache::new(10, Duration::from_nanos(1));
        cache.put("k1".to_string(), answer("a"));
        std::thread::sleep(Duration::from_millis(1));
        assert!(cache.get("k1").is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn lru_eviction_caps_entries() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.put("k1".to_string(), answer("a"));
        cache.put("k2".to_string(), answer("b"));
        // touch k1 so k2 becomes the eviction candidate
        cache.get("k1");
        cache.put("k3".to_string(), answer("c"));

        assert!(cache.get("k1").is_some());
        assert!(cache.get("k2").is_none());
        assert!(cache.get("k3").is_some());
        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn key_varies_with_model_tag() {
        assert_ne!(
            ResponseCache::key("how?", "embed-v1+gen-v1"),
            ResponseCache::key("how?", "embed-v1+gen-v2")
        );
        assert_eq!(
            ResponseCache::key("how?", "m"),
            ResponseCache::key("how?", "m")
        );
    }
}
