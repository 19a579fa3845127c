//! Request counters and the health surface.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::cache::CacheStats;
use crate::drivers::ProviderId;
use crate::resilience::PoolSnapshot;
use crate::types::GenerationStats;

/// Process-wide counters, updated lock-free except for the per-provider map.
#[derive(Debug, Default)]
pub struct OrchestratorStats {
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    key_rotations: AtomicU64,
    errors: AtomicU64,
    per_provider: Mutex<BTreeMap<ProviderId, u64>>,
}

impl OrchestratorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rotation(&self) {
        self.key_rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_call(&self, provider: ProviderId) {
        *self.per_provider.lock().entry(provider).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> GenerationStats {
        GenerationStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            per_provider_calls: self
                .per_provider
                .lock()
                .iter()
                .map(|(id, n)| (id.to_string(), *n))
                .collect(),
            key_rotations: self.key_rotations.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every provider is available
    Healthy,
    /// Some providers are available
    Degraded,
    /// No provider is available
    Down,
}

impl HealthStatus {
    pub fn from_counts(available: usize, total: usize) -> Self {
        match available {
            0 => HealthStatus::Down,
            n if n == total => HealthStatus::Healthy,
            _ => HealthStatus::Degraded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub provider: ProviderId,
    pub available: bool,
    pub credential_count: usize,
    pub in_fallback_chain: bool,
    pub pool: PoolSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub providers: Vec<ProviderHealth>,
    pub stats: GenerationStats,
    pub cache: CacheStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_from_counts() {
        assert_eq!(HealthStatus::from_counts(3, 3), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_counts(1, 3), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from_counts(0, 3), HealthStatus::Down);
        assert_eq!(HealthStatus::from_counts(0, 0), HealthStatus::Down);
    }

    #[test]
    fn snapshot_names_providers() {
        let stats = OrchestratorStats::new();
        stats.record_call(ProviderId::Gemini);
        stats.record_call(ProviderId::Gemini);
        stats.record_call(ProviderId::OpenAi);
        stats.record_rotation();
        let snap = stats.snapshot();
        assert_eq!(snap.per_provider_calls.get("gemini"), Some(&2));
        assert_eq!(snap.per_provider_calls.get("openai"), Some(&1));
        assert_eq!(snap.key_rotations, 1);
    }
}
