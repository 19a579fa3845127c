//! 厂商注册表 — 按 ProviderId 管理驱动、凭证池与优先级，并提供模型路由表
//!
//! Provider registry and model routing.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ProviderRegistry`] | One [`ProviderProfile`] per backend, keyed by [`ProviderId`] |
//! | [`ModelRouter`] | Fixed prefix table mapping a model name to a provider |

pub mod router;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::OrchestratorConfig;
use crate::drivers::{create_driver, HttpProvider, Provider, ProviderId};
use crate::resilience::CredentialPool;
use crate::transport::HttpTransport;
use crate::Result;

pub use router::{ModelRouter, Route};

/// Everything the orchestrator needs to drive one backend.
#[derive(Clone)]
pub struct ProviderProfile {
    pub id: ProviderId,
    /// Lower runs first; ties follow [`ProviderId`] order.
    pub priority: u32,
    pub in_fallback_chain: bool,
    pub pool: Arc<CredentialPool>,
    pub provider: Arc<dyn Provider>,
}

impl ProviderProfile {
    pub fn new(
        provider: Arc<dyn Provider>,
        pool: Arc<CredentialPool>,
        priority: u32,
        in_fallback_chain: bool,
    ) -> Self {
        Self {
            id: provider.id(),
            priority,
            in_fallback_chain,
            pool,
            provider,
        }
    }

    /// Has the credentials it needs, ignoring reachability.
    pub fn is_configured(&self) -> bool {
        !self.id.requires_credential() || !self.pool.is_empty()
    }

    /// Configured and, for a local runner, answering its reachability check.
    pub async fn is_available(&self) -> bool {
        self.is_configured() && self.provider.is_reachable().await
    }
}

impl std::fmt::Debug for ProviderProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderProfile")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("in_fallback_chain", &self.in_fallback_chain)
            .field("credentials", &self.pool.len())
            .finish()
    }
}

#[derive(Debug, Default, Clone)]
pub struct ProviderRegistry {
    profiles: HashMap<ProviderId, ProviderProfile>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP-backed profiles for every configured provider.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        let mut registry = Self::new();
        for pc in &config.providers {
            let transport = HttpTransport::new(pc.base_url.clone(), pc.timeout())?;
            let provider = HttpProvider::new(create_driver(pc.id), transport, pc.model.clone());
            let pool = CredentialPool::new(pc.id, pc.credentials.iter().cloned());
            tracing::debug!(
                provider = %pc.id,
                credentials = pool.len(),
                priority = pc.priority,
                fallback = pc.fallback,
                "provider registered"
            );
            registry.register(ProviderProfile::new(
                Arc::new(provider),
                Arc::new(pool),
                pc.priority,
                pc.fallback,
            ));
        }
        Ok(registry)
    }

    /// Insert or replace the profile for its provider.
    pub fn register(&mut self, profile: ProviderProfile) -> &mut Self {
        self.profiles.insert(profile.id, profile);
        self
    }

    pub fn get(&self, id: ProviderId) -> Option<&ProviderProfile> {
        self.profiles.get(&id)
    }

    /// All profiles in priority order.
    pub fn ordered(&self) -> Vec<&ProviderProfile> {
        let mut all: Vec<&ProviderProfile> = self.profiles.values().collect();
        all.sort_by_key(|p| (p.priority, p.id));
        all
    }

    /// Non-streaming fallback chain in priority order.
    pub fn fallback_chain(&self) -> Vec<&ProviderProfile> {
        self.ordered()
            .into_iter()
            .filter(|p| p.in_fallback_chain)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
