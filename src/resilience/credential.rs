use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Consecutive hard errors after which a credential is disabled for the life of the process.
pub const DISABLE_THRESHOLD: u32 = 5;

/// Rate-limit cooldown used when the provider does not say how long to wait.
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

/// Health of one credential.
///
/// `Healthy ⇄ RateLimited(until)` recovers with time; `Disabled` never recovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialHealth {
    Healthy,
    RateLimited { until: Instant },
    Disabled,
}

/// One secret of a provider's pool with its usage bookkeeping.
#[derive(Clone)]
pub struct Credential {
    secret: String,
    pub health: CredentialHealth,
    pub request_count: u64,
    pub consecutive_errors: u32,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            health: CredentialHealth::Healthy,
            request_count: 0,
            consecutive_errors: 0,
            last_used_at: None,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Bring an expired rate limit back to `Healthy`. Returns whether the credential is usable.
    pub(crate) fn refresh(&mut self, now: Instant) -> bool {
        match self.health {
            CredentialHealth::Healthy => true,
            CredentialHealth::RateLimited { until } if now >= until => {
                self.health = CredentialHealth::Healthy;
                self.consecutive_errors = 0;
                true
            }
            CredentialHealth::RateLimited { .. } | CredentialHealth::Disabled => false,
        }
    }

    pub(crate) fn rate_limited_until(&self) -> Option<Instant> {
        match self.health {
            CredentialHealth::RateLimited { until } => Some(until),
            _ => None,
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("secret", &mask(&self.secret))
            .field("health", &self.health)
            .field("request_count", &self.request_count)
            .field("consecutive_errors", &self.consecutive_errors)
            .field("last_used_at", &self.last_used_at)
            .finish()
    }
}

/// Last four characters only, e.g. `…a1b2`.
pub fn mask(secret: &str) -> String {
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("…{}", tail)
}
