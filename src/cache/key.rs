//! Cache key generation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w'-]+").expect("valid word pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
    pub scope: String,
}

impl CacheKey {
    /// Key for `prompt` within `scope`: sha256 over the scope and the normalized prompt.
    pub fn for_prompt(scope: &str, prompt: &str) -> Self {
        let mut parts: BTreeMap<&str, String> = BTreeMap::new();
        parts.insert("scope", scope.to_string());
        parts.insert("prompt", normalize(prompt));
        let canonical = serde_json::to_string(&parts).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        Self {
            hash,
            scope: scope.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.scope, self.hash)
    }
}

/// Lowercase, trim and collapse internal whitespace.
pub fn normalize(prompt: &str) -> String {
    prompt
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Words of the normalized prompt longer than `min_len` characters.
pub fn significant_words(prompt: &str, min_len: usize) -> Vec<String> {
    let normalized = normalize(prompt);
    WORD.find_iter(&normalized)
        .map(|m| m.as_str().to_string())
        .filter(|w| w.chars().count() > min_len)
        .collect()
}
