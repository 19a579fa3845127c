//! 弹性模块：按厂商管理凭证池，实现轮换与健康状态机。
//!
//! # Credential Pools
//!
//! Each provider owns one [`CredentialPool`] for the life of the process. The pool
//! hands out credentials round-robin and tracks their health:
//!
//! ```text
//!   Healthy ──rate limit──▶ RateLimited(until) ──deadline passes──▶ Healthy
//!      │
//!      └──5 consecutive errors──▶ Disabled (until restart)
//! ```
//!
//! ```rust
//! use ai_codegen::drivers::ProviderId;
//! use ai_codegen::resilience::CredentialPool;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let pool = CredentialPool::new(ProviderId::Gemini, ["key-a", "key-b"]);
//! let lease = pool.next().expect("two healthy keys");
//! pool.mark_rate_limited(&lease, Duration::from_secs(60));
//! assert_eq!(pool.next().unwrap().index(), 1);
//! # }
//! ```

pub mod credential;
pub mod pool;

pub use credential::{
    Credential, CredentialHealth, DEFAULT_RATE_LIMIT_COOLDOWN, DISABLE_THRESHOLD,
};
pub use pool::{CredentialLease, CredentialPool, PoolError, PoolSnapshot};
