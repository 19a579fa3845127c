//! Requests and results of the generation entry points.

use super::file::GeneratedFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prompt plus an optional model hint. Immutable input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_hint: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model_hint: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_hint = Some(model.into());
        self
    }
}

/// Edit variant of the streaming entry point: current files plus an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub files: Vec<GeneratedFile>,
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_hint: Option<String>,
}

impl EditRequest {
    pub fn new(files: Vec<GeneratedFile>, instruction: impl Into<String>) -> Self {
        Self {
            files,
            instruction: instruction.into(),
            model_hint: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_hint = Some(model.into());
        self
    }
}

/// Aggregate counters attached to every non-streaming response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub per_provider_calls: BTreeMap<String, u64>,
    pub key_rotations: u64,
    pub errors: u64,
}

/// Non-streaming response.
///
/// Exhaustion of every provider is not an error: it is reported with
/// `is_refreshing = true` and an empty file list so the caller simply retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub success: bool,
    pub files: Vec<GeneratedFile>,
    pub provider: Option<String>,
    pub cached: bool,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_refreshing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    pub stats: GenerationStats,
}

impl GenerationResult {
    pub fn generated(
        files: Vec<GeneratedFile>,
        provider: impl Into<String>,
        cached: bool,
        stats: GenerationStats,
    ) -> Self {
        Self {
            success: true,
            files,
            provider: Some(provider.into()),
            cached,
            generated_at: Utc::now(),
            is_refreshing: false,
            message: None,
            retry_after_secs: None,
            stats,
        }
    }

    /// Soft failure: nothing generated, ask the caller to retry shortly.
    pub fn refreshing(
        message: impl Into<String>,
        retry_after_secs: Option<u64>,
        stats: GenerationStats,
    ) -> Self {
        Self {
            success: false,
            files: Vec::new(),
            provider: None,
            cached: false,
            generated_at: Utc::now(),
            is_refreshing: true,
            message: Some(message.into()),
            retry_after_secs,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refreshing_serializes_camel_case() {
        let r = GenerationResult::refreshing("wait", Some(12), GenerationStats::default());
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["isRefreshing"], true);
        assert_eq!(v["retryAfterSecs"], 12);
        assert_eq!(v["files"].as_array().unwrap().len(), 0);
        assert!(v.get("generatedAt").is_some());
    }

    #[test]
    fn test_success_omits_refresh_flag() {
        let r = GenerationResult::generated(
            vec![GeneratedFile::new("a.ts", "x")],
            "ollama",
            false,
            GenerationStats::default(),
        );
        let v = serde_json::to_value(&r).unwrap();
        assert!(v.get("isRefreshing").is_none());
        assert_eq!(v["provider"], "ollama");
    }
}
