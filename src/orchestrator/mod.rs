//! 生成编排模块：缓存、凭证轮换、厂商降级与流式重建的总入口。
//!
//! # Generation Orchestrator
//!
//! [`Orchestrator`] is the one entry point callers use. It is cheap to clone; all
//! services behind it are shared by `Arc`.
//!
//! ```text
//! generate_code ──▶ cache ──hit──▶ result (cached)
//!                     │miss
//!                     ▼
//!          fallback chain (priority order)
//!          ┌──────────────────────────────┐
//!          │ pool.next() ─▶ complete() ───┼─ ok ─▶ validate ─▶ cache ─▶ result
//!          │   ▲  rate limit / error      │
//!          │   └── rotate credential ◀────┘
//!          └── exhausted ─▶ next provider ─▶ ... ─▶ soft failure (isRefreshing)
//!
//! generate_files ──▶ router ──▶ one provider ──▶ StreamReconstructor ──▶ audit ──▶ Complete
//! ```
//!
//! | Entry point | Returns |
//! |-------------|---------|
//! | [`Orchestrator::generate_code`] | [`GenerationResult`], never an error |
//! | [`Orchestrator::generate_files`] | [`EventStream`] ending in exactly one `Complete` |
//! | [`Orchestrator::edit_files`] | Same contract as `generate_files` |
//! | [`Orchestrator::health`] | [`HealthReport`] |

pub mod stats;
mod stream;

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use std::pin::Pin;
use tokio::time::Instant;

use crate::audit::Auditor;
use crate::cache::{CacheStats, ResponseCache};
use crate::config::OrchestratorConfig;
use crate::drivers::Prompt;
use crate::error_code::ErrorClass;
use crate::registry::{ModelRouter, ProviderProfile, ProviderRegistry};
use crate::resilience::{CredentialLease, CredentialPool, PoolError, DEFAULT_RATE_LIMIT_COOLDOWN};
use crate::structured::PayloadValidator;
use crate::types::{GeneratedPayload, GenerationRequest, GenerationResult, GenerationStats, StreamEvent};
use crate::{Error, ErrorContext, Result};

pub use stats::{HealthReport, HealthStatus, OrchestratorStats, ProviderHealth};

/// Cache partition of the provider-agnostic path.
pub const ANY_SCOPE: &str = "any";

const SOFT_FAILURE_MESSAGE: &str =
    "All code generation providers are busy right now. Please wait a moment and try again.";

/// Infallible event stream; failures arrive as `Error` events.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send + 'static>>;

#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    router: ModelRouter,
    cache: Arc<ResponseCache>,
    validator: Arc<PayloadValidator>,
    auditor: Auditor,
    stats: Arc<OrchestratorStats>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.registry.len())
            .field("router", &self.router)
            .field("cache", &self.cache.backend_name())
            .field("auditor", &self.auditor)
            .finish()
    }
}

/// Why one provider produced nothing.
enum ProviderFailure {
    /// Credentials are rate limited; usable again at this instant if known.
    Exhausted(Option<Instant>),
    /// Every attempt failed or the output was unusable.
    Failed,
}

impl Orchestrator {
    pub fn new(
        registry: ProviderRegistry,
        router: ModelRouter,
        cache: ResponseCache,
        auditor: Auditor,
    ) -> Result<Self> {
        Ok(Self {
            registry: Arc::new(registry),
            router,
            cache: Arc::new(cache),
            validator: Arc::new(PayloadValidator::new()?),
            auditor,
            stats: Arc::new(OrchestratorStats::new()),
        })
    }

    /// HTTP providers, in-memory cache and audit sandbox as configured.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        let orchestrator = Self::new(
            ProviderRegistry::from_config(config)?,
            ModelRouter::new(config.default_stream_provider),
            ResponseCache::from_config(config.cache.clone()),
            Auditor::from_config(&config.audit),
        )?;
        tracing::info!(
            providers = orchestrator.registry.len(),
            audit = orchestrator.auditor.is_enabled(),
            "orchestrator ready"
        );
        Ok(orchestrator)
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    /// Non-streaming generation. Never fails: exhaustion and internal errors are
    /// reported as a soft failure with `is_refreshing = true`.
    pub async fn generate_code(&self, request: &GenerationRequest) -> GenerationResult {
        self.stats.record_request();
        match self.try_generate(request).await {
            Ok(result) => result,
            Err(e) => {
                self.stats.record_error();
                tracing::warn!(error = %e, "generation failed unexpectedly");
                GenerationResult::refreshing(SOFT_FAILURE_MESSAGE, None, self.stats.snapshot())
            }
        }
    }

    async fn try_generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        if request.prompt.trim().is_empty() {
            return Err(Error::validation_with_context(
                "prompt is empty",
                ErrorContext::new().with_field_path("prompt"),
            ));
        }

        if let Some(result) = self.from_cache(&request.prompt).await? {
            return Ok(result);
        }

        let hinted = request
            .model_hint
            .as_deref()
            .and_then(|m| self.router.lookup(m));
        let mut retry_at: Option<Instant> = None;

        for profile in self.registry.fallback_chain() {
            if !profile.is_configured() {
                tracing::debug!(provider = %profile.id, "skipping provider without credentials");
                continue;
            }
            if !profile.provider.is_reachable().await {
                tracing::debug!(provider = %profile.id, "skipping unreachable provider");
                continue;
            }

            let model = hinted
                .as_ref()
                .filter(|r| r.provider == profile.id)
                .and_then(|r| r.model.clone());
            let prompt = Prompt::files(&request.prompt).with_model(model);

            match self.call_provider(profile, &prompt).await {
                Ok(payload) => {
                    let provider = profile.id.to_string();
                    self.cache
                        .set(&request.prompt, ANY_SCOPE, serde_json::to_string(&payload)?, &provider)
                        .await?;
                    tracing::info!(provider = %provider, files = payload.files.len(), "generation succeeded");
                    return Ok(GenerationResult::generated(
                        payload.files,
                        provider,
                        false,
                        self.stats.snapshot(),
                    ));
                }
                Err(ProviderFailure::Exhausted(at)) => {
                    retry_at = earliest(retry_at, at);
                }
                Err(ProviderFailure::Failed) => {}
            }
        }

        let retry_after_secs = retry_at.map(|at| {
            at.saturating_duration_since(Instant::now())
                .as_secs()
                .max(1)
        });
        tracing::warn!(?retry_after_secs, "every provider exhausted, returning soft failure");
        Ok(GenerationResult::refreshing(
            SOFT_FAILURE_MESSAGE,
            retry_after_secs,
            self.stats.snapshot(),
        ))
    }

    async fn from_cache(&self, prompt: &str) -> Result<Option<GenerationResult>> {
        let Some(hit) = self.cache.get(prompt, ANY_SCOPE).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<GeneratedPayload>(&hit.payload) {
            Ok(payload) => {
                self.stats.record_cache_hit();
                tracing::info!(provider = %hit.provider_used, fuzzy = hit.fuzzy, "served from cache");
                Ok(Some(GenerationResult::generated(
                    payload.files,
                    hit.provider_used,
                    true,
                    self.stats.snapshot(),
                )))
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable cache entry");
                Ok(None)
            }
        }
    }

    /// Drive one provider, rotating through its credentials.
    async fn call_provider(
        &self,
        profile: &ProviderProfile,
        prompt: &Prompt,
    ) -> std::result::Result<GeneratedPayload, ProviderFailure> {
        let pooled = profile.id.requires_credential();
        let attempts = if pooled { profile.pool.len() } else { 1 };

        for attempt in 0..attempts {
            let lease = if pooled {
                match profile.pool.next() {
                    Ok(lease) => Some(lease),
                    Err(PoolError::Exhausted { retry_at, .. }) => {
                        tracing::debug!(provider = %profile.id, attempt, "credential pool exhausted");
                        return Err(ProviderFailure::Exhausted(retry_at));
                    }
                }
            } else {
                None
            };
            if attempt > 0 {
                self.stats.record_rotation();
            }
            self.stats.record_call(profile.id);
            tracing::debug!(
                provider = %profile.id,
                attempt,
                credential = lease.as_ref().map(|l| l.index()),
                "calling provider"
            );

            let text = match profile.provider.complete(prompt, lease.as_ref()).await {
                Ok(text) => text,
                Err(e) => {
                    self.stats.record_error();
                    report_failure(&profile.pool, lease.as_ref(), &e);
                    continue;
                }
            };

            return match self.validator.parse(&text) {
                Ok(payload) => {
                    if let Some(lease) = &lease {
                        profile.pool.mark_success(lease);
                    }
                    Ok(payload)
                }
                Err(e) => {
                    // The call itself worked; the credential keeps its standing.
                    self.stats.record_error();
                    tracing::warn!(provider = %profile.id, error = %e, "malformed payload, falling back");
                    Err(ProviderFailure::Failed)
                }
            };
        }

        if pooled {
            Err(ProviderFailure::Exhausted(profile.pool.soonest_recovery()))
        } else {
            Err(ProviderFailure::Failed)
        }
    }

    /// Per-provider availability, pool health and counters.
    pub async fn health(&self) -> HealthReport {
        let profiles = self.registry.ordered();
        let available = futures::future::join_all(profiles.iter().map(|p| p.is_available())).await;

        let providers: Vec<ProviderHealth> = profiles
            .iter()
            .zip(available)
            .map(|(p, available)| ProviderHealth {
                provider: p.id,
                available,
                credential_count: p.pool.len(),
                in_fallback_chain: p.in_fallback_chain,
                pool: p.pool.snapshot(),
            })
            .collect();
        let up = providers.iter().filter(|p| p.available).count();

        HealthReport {
            status: HealthStatus::from_counts(up, providers.len()),
            providers,
            stats: self.stats.snapshot(),
            cache: self.cache.stats().await.unwrap_or_default(),
        }
    }

    pub fn stats(&self) -> GenerationStats {
        self.stats.snapshot()
    }

    pub async fn cache_stats(&self) -> Result<CacheStats> {
        self.cache.stats().await
    }

    pub async fn clear_cache(&self) -> Result<()> {
        self.cache.clear().await
    }
}

/// Record a failed call against the credential that made it.
fn report_failure(pool: &CredentialPool, lease: Option<&CredentialLease>, error: &Error) {
    let class = error.class();
    match lease {
        Some(lease) if class == ErrorClass::RateLimited => {
            let wait = error.retry_after().unwrap_or(DEFAULT_RATE_LIMIT_COOLDOWN);
            pool.mark_rate_limited(lease, wait);
        }
        Some(lease) if class.penalizes_credential() => {
            tracing::warn!(provider = %pool.provider(), credential = lease.index(), class = %class, error = %error, "provider call failed");
            pool.mark_error(lease);
        }
        Some(lease) => {
            tracing::debug!(provider = %pool.provider(), credential = lease.index(), class = %class, error = %error, "provider call failed; credential left as is");
        }
        None => {
            tracing::debug!(provider = %pool.provider(), class = %class, error = %error, "provider call failed");
        }
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Human wait hint for an exhausted pool.
fn wait_hint(retry_after: Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!("retry in about {}s", d.as_secs().max(1)),
        None => "retry later".to_string(),
    }
}
