//! Response cache: exact lookup, fuzzy fallback, TTL and capacity bound.

use super::backend::{CacheBackend, CacheEntry, MemoryCache, NullCache};
use super::key::{significant_words, CacheKey};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Words must be longer than this to take part in fuzzy matching.
const FUZZY_MIN_WORD_LEN: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub capacity: usize,
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
    /// Fraction of prompt words that must appear in a cached payload's head.
    pub fuzzy_threshold: f64,
    /// How many leading payload characters the fuzzy scan looks at.
    pub fuzzy_window: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 300,
            ttl: Duration::from_secs(3600),
            fuzzy_threshold: 0.70,
            fuzzy_window: 200,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub total_hits: u64,
    #[serde(rename = "averageAgeSecs", serialize_with = "as_secs_f64")]
    pub average_age: Duration,
    pub hits: u64,
    pub misses: u64,
    pub fuzzy_hits: u64,
    pub evictions: u64,
}

fn as_secs_f64<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A cached payload returned by [`ResponseCache::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit {
    pub payload: String,
    pub provider_used: String,
    pub hit_count: u64,
    /// Found by word overlap rather than the exact key.
    pub fuzzy: bool,
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    fuzzy_hits: AtomicU64,
    evictions: AtomicU64,
}

/// Shared prompt → payload cache.
///
/// Lookups try the exact normalized-prompt key first, then a word-overlap scan
/// of the same scope. The overlap scan can match a *different* prompt that shares
/// enough long words with a cached payload; that imprecision is accepted.
pub struct ResponseCache {
    config: CacheConfig,
    backend: Box<dyn CacheBackend>,
    stats: AtomicStats,
}

impl ResponseCache {
    pub fn new(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend,
            stats: AtomicStats::default(),
        }
    }

    /// Backend chosen from config: in-memory, or a no-op store when disabled.
    pub fn from_config(config: CacheConfig) -> Self {
        let backend: Box<dyn CacheBackend> = if config.enabled {
            Box::new(MemoryCache::new())
        } else {
            Box::new(NullCache::new())
        };
        Self::new(config, backend)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub async fn get(&self, prompt: &str, scope: &str) -> Result<Option<CacheHit>> {
        let key = CacheKey::for_prompt(scope, prompt);
        if let Some(entry) = self.backend.get(&key, self.config.ttl).await? {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, hits = entry.hit_count, "cache hit");
            return Ok(Some(Self::hit(entry, false)));
        }

        let words = significant_words(prompt, FUZZY_MIN_WORD_LEN);
        if !words.is_empty() {
            let window = self.config.fuzzy_window;
            let scorer = move |payload: &str| word_overlap(&words, payload, window);
            if let Some(entry) = self
                .backend
                .best_match(scope, self.config.ttl, self.config.fuzzy_threshold, &scorer)
                .await?
            {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                self.stats.fuzzy_hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %entry.key, "fuzzy cache hit");
                return Ok(Some(Self::hit(entry, true)));
            }
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    pub async fn set(
        &self,
        prompt: &str,
        scope: &str,
        payload: impl Into<String>,
        provider_used: &str,
    ) -> Result<()> {
        let key = CacheKey::for_prompt(scope, prompt);
        let entry = CacheEntry::new(key, payload.into(), provider_used);
        if let Some(evicted) = self.backend.insert(entry, self.config.capacity).await? {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %evicted, "evicted oldest cache entry");
        }
        Ok(())
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let summary = self.backend.summary().await?;
        let average_age = if summary.size == 0 {
            Duration::ZERO
        } else {
            summary.total_age / summary.size as u32
        };
        Ok(CacheStats {
            size: summary.size,
            total_hits: summary.total_hits,
            average_age,
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            fuzzy_hits: self.stats.fuzzy_hits.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
        })
    }

    pub async fn clear(&self) -> Result<()> {
        tracing::info!(backend = self.backend.name(), "clearing response cache");
        self.backend.clear().await
    }

    pub async fn len(&self) -> Result<usize> {
        self.backend.len().await
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn hit(entry: CacheEntry, fuzzy: bool) -> CacheHit {
        CacheHit {
            payload: entry.payload,
            provider_used: entry.provider_used,
            hit_count: entry.hit_count,
            fuzzy,
        }
    }
}

/// Fraction of `words` found in the first `window` characters of `payload`.
fn word_overlap(words: &[String], payload: &str, window: usize) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    let head: String = payload.chars().take(window).collect::<String>().to_lowercase();
    let found = words.iter().filter(|w| head.contains(w.as_str())).count();
    found as f64 / words.len() as f64
}
