//! Cache backend implementations.

use super::key::CacheKey;
use crate::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: String,
    pub created_at: Instant,
    pub hit_count: u64,
    pub provider_used: String,
}

impl CacheEntry {
    pub fn new(key: CacheKey, payload: String, provider_used: impl Into<String>) -> Self {
        Self {
            key,
            payload,
            created_at: Instant::now(),
            hit_count: 0,
            provider_used: provider_used.into(),
        }
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }
}

/// Aggregate view of stored entries, expired or not.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendSummary {
    pub size: usize,
    pub total_hits: u64,
    pub total_age: Duration,
}

/// Scores a cached payload against the current lookup; higher is better.
pub type PayloadScorer<'a> = &'a (dyn Fn(&str) -> f64 + Send + Sync);

#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Exact lookup. Expired entries are removed on sight; a hit bumps `hit_count`.
    async fn get(&self, key: &CacheKey, ttl: Duration) -> Result<Option<CacheEntry>>;

    /// Best live entry of `scope` whose score exceeds `threshold`; the winner's `hit_count` is bumped.
    async fn best_match(
        &self,
        scope: &str,
        ttl: Duration,
        threshold: f64,
        scorer: PayloadScorer<'_>,
    ) -> Result<Option<CacheEntry>>;

    /// Insert, evicting the entry with the oldest `created_at` when at capacity.
    /// Returns the evicted key, if any.
    async fn insert(&self, entry: CacheEntry, capacity: usize) -> Result<Option<CacheKey>>;

    async fn clear(&self) -> Result<()>;
    async fn len(&self) -> Result<usize>;
    async fn summary(&self) -> Result<BackendSummary>;
    fn name(&self) -> &'static str;
}

pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn evict_oldest(entries: &mut HashMap<String, CacheEntry>) -> Option<CacheKey> {
        let oldest = entries
            .iter()
            .min_by_key(|(_, e)| e.created_at)
            .map(|(k, _)| k.clone())?;
        entries.remove(&oldest).map(|e| e.key)
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey, ttl: Duration) -> Result<Option<CacheEntry>> {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(&key.hash) {
            if entry.is_expired(ttl) {
                entries.remove(&key.hash);
                return Ok(None);
            }
            entry.hit_count += 1;
            return Ok(Some(entry.clone()));
        }
        Ok(None)
    }

    async fn best_match(
        &self,
        scope: &str,
        ttl: Duration,
        threshold: f64,
        scorer: PayloadScorer<'_>,
    ) -> Result<Option<CacheEntry>> {
        let mut entries = self.entries.write();
        entries.retain(|_, e| e.key.scope != scope || !e.is_expired(ttl));

        let best = entries
            .iter()
            .filter(|(_, e)| e.key.scope == scope)
            .map(|(k, e)| (k, scorer(&e.payload), e.created_at))
            .filter(|(_, score, _)| *score > threshold)
            // Highest score; newest entry breaks ties.
            .max_by(|a, b| a.1.total_cmp(&b.1).then(a.2.cmp(&b.2)))
            .map(|(k, _, _)| k.clone());

        Ok(best.and_then(|k| {
            entries.get_mut(&k).map(|e| {
                e.hit_count += 1;
                e.clone()
            })
        }))
    }

    async fn insert(&self, entry: CacheEntry, capacity: usize) -> Result<Option<CacheKey>> {
        let mut entries = self.entries.write();
        let mut evicted = None;
        if !entries.contains_key(&entry.key.hash) && entries.len() >= capacity.max(1) {
            evicted = Self::evict_oldest(&mut entries);
        }
        entries.insert(entry.key.hash.clone(), entry);
        Ok(evicted)
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }

    async fn summary(&self) -> Result<BackendSummary> {
        let entries = self.entries.read();
        Ok(entries.values().fold(
            BackendSummary {
                size: entries.len(),
                ..Default::default()
            },
            |mut acc, e| {
                acc.total_hits += e.hit_count;
                acc.total_age += e.age();
                acc
            },
        ))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

pub struct NullCache;
impl NullCache {
    pub fn new() -> Self {
        Self
    }
}
impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _: &CacheKey, _: Duration) -> Result<Option<CacheEntry>> {
        Ok(None)
    }
    async fn best_match(
        &self,
        _: &str,
        _: Duration,
        _: f64,
        _: PayloadScorer<'_>,
    ) -> Result<Option<CacheEntry>> {
        Ok(None)
    }
    async fn insert(&self, _: CacheEntry, _: usize) -> Result<Option<CacheKey>> {
        Ok(None)
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    async fn summary(&self) -> Result<BackendSummary> {
        Ok(BackendSummary::default())
    }
    fn name(&self) -> &'static str {
        "null"
    }
}
