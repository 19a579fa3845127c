use super::credential::{mask, Credential, CredentialHealth, DISABLE_THRESHOLD};
use crate::drivers::ProviderId;
use chrono::Utc;
use parking_lot::Mutex;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("credential pool for {provider} is exhausted")]
    Exhausted {
        provider: ProviderId,
        /// Soonest moment a rate-limited credential becomes usable again.
        /// `None` when the pool is empty or every credential is disabled.
        retry_at: Option<Instant>,
    },
}

impl PoolError {
    /// Estimated wait until the pool can hand out a credential again.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PoolError::Exhausted { retry_at, .. } => {
                retry_at.map(|at| at.saturating_duration_since(Instant::now()))
            }
        }
    }
}

/// A checked-out credential. Outcomes are reported back against it.
#[derive(Clone)]
pub struct CredentialLease {
    provider: ProviderId,
    index: usize,
    secret: String,
}

impl CredentialLease {
    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for CredentialLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialLease")
            .field("provider", &self.provider)
            .field("index", &self.index)
            .field("secret", &mask(&self.secret))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub total: usize,
    pub healthy: usize,
    pub rate_limited: usize,
    pub disabled: usize,
}

#[derive(Debug)]
struct State {
    credentials: Vec<Credential>,
    cursor: usize,
}

/// Round-robin credential pool for one provider.
///
/// - Skips disabled and still rate-limited credentials
/// - Rate limits recover once their deadline passes; disabled credentials never do
/// - Cursor and health share one lock, so rotation among concurrent callers is
///   approximately (not strictly) fair
pub struct CredentialPool {
    provider: ProviderId,
    state: Mutex<State>,
}

impl CredentialPool {
    pub fn new<I, S>(provider: ProviderId, secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let credentials = secrets.into_iter().map(Credential::new).collect();
        Self {
            provider,
            state: Mutex::new(State {
                credentials,
                cursor: 0,
            }),
        }
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn len(&self) -> usize {
        self.state.lock().credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand out the next usable credential, starting at the rotating cursor.
    pub fn next(&self) -> Result<CredentialLease, PoolError> {
        let now = Instant::now();
        let mut st = self.state.lock();
        let len = st.credentials.len();
        let start = st.cursor;

        for offset in 0..len {
            let index = (start + offset) % len;
            let cred = &mut st.credentials[index];
            if !cred.refresh(now) {
                continue;
            }
            cred.request_count += 1;
            cred.last_used_at = Some(Utc::now());
            let secret = cred.secret().to_string();
            st.cursor = (index + 1) % len;
            return Ok(CredentialLease {
                provider: self.provider,
                index,
                secret,
            });
        }

        let retry_at = st
            .credentials
            .iter()
            .filter_map(|c| c.rate_limited_until())
            .min();
        Err(PoolError::Exhausted {
            provider: self.provider,
            retry_at,
        })
    }

    pub fn mark_rate_limited(&self, lease: &CredentialLease, retry_after: Duration) {
        self.with_credential(lease, |cred| {
            cred.consecutive_errors = cred.consecutive_errors.saturating_add(1);
            if cred.health != CredentialHealth::Disabled {
                cred.health = CredentialHealth::RateLimited {
                    until: Instant::now() + retry_after,
                };
            }
        });
        tracing::warn!(
            provider = %self.provider,
            credential = lease.index,
            retry_after_secs = retry_after.as_secs(),
            "credential rate-limited"
        );
    }

    pub fn mark_error(&self, lease: &CredentialLease) {
        let disabled = self.with_credential(lease, |cred| {
            cred.consecutive_errors = cred.consecutive_errors.saturating_add(1);
            if cred.consecutive_errors >= DISABLE_THRESHOLD
                && cred.health != CredentialHealth::Disabled
            {
                cred.health = CredentialHealth::Disabled;
                return true;
            }
            false
        });
        if disabled == Some(true) {
            tracing::warn!(
                provider = %self.provider,
                credential = lease.index,
                "credential disabled after {} consecutive errors",
                DISABLE_THRESHOLD
            );
        }
    }

    /// Reset the error streak. A disabled credential stays disabled.
    pub fn mark_success(&self, lease: &CredentialLease) {
        self.with_credential(lease, |cred| {
            cred.consecutive_errors = 0;
            if cred.health != CredentialHealth::Disabled {
                cred.health = CredentialHealth::Healthy;
            }
        });
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let now = Instant::now();
        let st = self.state.lock();
        let mut snap = PoolSnapshot {
            total: st.credentials.len(),
            ..Default::default()
        };
        for c in &st.credentials {
            match c.health {
                CredentialHealth::Healthy => snap.healthy += 1,
                CredentialHealth::RateLimited { until } if now >= until => snap.healthy += 1,
                CredentialHealth::RateLimited { .. } => snap.rate_limited += 1,
                CredentialHealth::Disabled => snap.disabled += 1,
            }
        }
        snap
    }

    /// Earliest instant a rate-limited credential becomes usable again.
    pub fn soonest_recovery(&self) -> Option<Instant> {
        let now = Instant::now();
        self.state
            .lock()
            .credentials
            .iter()
            .filter_map(|c| c.rate_limited_until())
            .filter(|until| *until > now)
            .min()
    }

    /// Copy of one credential's state, mainly for diagnostics and tests.
    pub fn credential(&self, index: usize) -> Option<Credential> {
        self.state.lock().credentials.get(index).cloned()
    }

    fn with_credential<R>(
        &self,
        lease: &CredentialLease,
        f: impl FnOnce(&mut Credential) -> R,
    ) -> Option<R> {
        if lease.provider != self.provider {
            return None;
        }
        let mut st = self.state.lock();
        st.credentials.get_mut(lease.index).map(f)
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("provider", &self.provider)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
