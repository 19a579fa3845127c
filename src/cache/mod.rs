//! 响应缓存模块：精确 + 模糊查找，TTL 与容量上限，减少重复的厂商调用。
//!
//! # Response Caching Module
//!
//! Avoids repeat provider calls for repeat or near-repeat prompts.
//!
//! ## Lookup
//!
//! 1. **Exact**: sha256 over `(scope, normalize(prompt))`, where normalize lowercases,
//!    trims and collapses whitespace.
//! 2. **Fuzzy**: on an exact miss, every live entry of the same scope is scored by the
//!    fraction of the prompt's words (longer than 3 characters) that appear in the
//!    first 200 characters of its payload. Scores above 0.70 are hits.
//!
//! Expired entries are dropped lazily when a lookup meets them. At capacity, the entry
//! with the oldest creation time is evicted (not access order).
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ResponseCache`] | Lookup, insert, stats and clear |
//! | [`CacheConfig`] | Capacity, TTL and fuzzy-match tuning |
//! | [`CacheBackend`] | Trait for storage backends |
//! | [`MemoryCache`] | In-process map backend |
//! | [`NullCache`] | No-op backend used when caching is disabled |
//! | [`CacheKey`] | Scoped prompt hash |
//!
//! ## Example
//!
//! ```rust
//! use ai_codegen::cache::{CacheConfig, ResponseCache};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> ai_codegen::Result<()> {
//! let cache = ResponseCache::from_config(CacheConfig::new().with_ttl(Duration::from_secs(3600)));
//! cache.set("Make a button", "any", r#"{"files":[]}"#, "ollama").await?;
//! assert!(cache.get("make a  BUTTON", "any").await?.is_some());
//! # Ok(())
//! # }
//! ```

mod backend;
mod key;
mod manager;

pub use backend::{BackendSummary, CacheBackend, CacheEntry, MemoryCache, NullCache, PayloadScorer};
pub use key::{normalize, significant_words, CacheKey};
pub use manager::{CacheConfig, CacheHit, CacheStats, ResponseCache};
