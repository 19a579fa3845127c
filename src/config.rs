//! 配置模块：类型化的编排器配置，可从 YAML 或环境变量构建。
//!
//! # Configuration
//!
//! [`OrchestratorConfig`] is the single typed object every service is built from.
//! It can be loaded from YAML or assembled from the process environment:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `GEMINI_API_KEY_1..` / `GEMINI_API_KEY` | Gemini credential pool |
//! | `GROQ_API_KEY_1..` / `GROQ_API_KEY` | Groq credential pool |
//! | `OPENAI_API_KEY_1..` / `OPENAI_API_KEY` | OpenAI credential pool |
//! | `ANTHROPIC_API_KEY_1..` / `ANTHROPIC_API_KEY` | Anthropic credential pool |
//! | `OLLAMA_BASE_URL`, `OLLAMA_MODEL` | Local runner endpoint and model |
//! | `CODEGEN_AUDIT_CMD` | Enables the audit pass with this command line |
//!
//! ```yaml
//! cache:
//!   capacity: 300
//!   ttl: 3600
//! providers:
//!   - id: gemini
//!     base_url: https://generativelanguage.googleapis.com
//!     model: gemini-1.5-flash
//!     credentials: ["key-a", "key-b"]
//!     timeout_secs: 30
//!     priority: 1
//!     fallback: true
//! default_stream_provider: gemini
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::drivers::ProviderId;
use crate::{Error, ErrorContext, Result};

/// Highest numbered suffix tried during credential discovery.
pub const MAX_NUMBERED_CREDENTIALS: usize = 32;

/// Local runner timeout; cold starts may include a model download.
pub const LOCAL_TIMEOUT_SECS: u64 = 300;
pub const CLOUD_TIMEOUT_SECS: u64 = 30;
pub const AUDIT_TIMEOUT_SECS: u64 = 60;

/// Collect `<prefix>_1`, `<prefix>_2`, ... until the first gap, up to
/// [`MAX_NUMBERED_CREDENTIALS`]. The bare `<prefix>` is used only when no numbered
/// key exists. Blank values are ignored.
pub fn discover_credentials<F>(prefix: &str, lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let numbered: Vec<String> = (1..=MAX_NUMBERED_CREDENTIALS)
        .map(|i| present(&format!("{}_{}", prefix, i)))
        .take_while(Option::is_some)
        .flatten()
        .collect();

    if !numbered.is_empty() {
        return numbered;
    }
    present(prefix).into_iter().collect()
}

/// Environment variable prefix holding a provider's keys.
pub fn credential_prefix(id: ProviderId) -> Option<&'static str> {
    match id {
        ProviderId::Ollama => None,
        ProviderId::Gemini => Some("GEMINI_API_KEY"),
        ProviderId::Groq => Some("GROQ_API_KEY"),
        ProviderId::OpenAi => Some("OPENAI_API_KEY"),
        ProviderId::Anthropic => Some("ANTHROPIC_API_KEY"),
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: ProviderId,
    pub base_url: String,
    pub model: String,
    #[serde(default, skip_serializing)]
    pub credentials: Vec<String>,
    pub timeout_secs: u64,
    /// Lower runs first.
    pub priority: u32,
    /// Member of the non-streaming fallback chain.
    pub fallback: bool,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("id", &self.id)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("credentials", &self.credentials.len())
            .field("timeout_secs", &self.timeout_secs)
            .field("priority", &self.priority)
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl ProviderConfig {
    /// Built-in endpoint, model and position for a provider, with no credentials.
    pub fn defaults(id: ProviderId) -> Self {
        let (base_url, model, priority, fallback) = match id {
            ProviderId::Ollama => ("http://localhost:11434", "qwen2.5-coder:7b", 0, true),
            ProviderId::Gemini => (
                "https://generativelanguage.googleapis.com",
                "gemini-1.5-flash",
                1,
                true,
            ),
            ProviderId::Groq => ("https://api.groq.com/openai/v1", "llama-3.1-8b-instant", 2, true),
            ProviderId::OpenAi => ("https://api.openai.com/v1", "gpt-4o-mini", 3, false),
            ProviderId::Anthropic => (
                "https://api.anthropic.com",
                "claude-3-5-sonnet-latest",
                4,
                false,
            ),
        };
        Self {
            id,
            base_url: base_url.to_string(),
            model: model.to_string(),
            credentials: Vec::new(),
            timeout_secs: if id == ProviderId::Ollama {
                LOCAL_TIMEOUT_SECS
            } else {
                CLOUD_TIMEOUT_SECS
            },
            priority,
            fallback,
        }
    }

    pub fn with_credentials<I, S>(mut self, credentials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.credentials = credentials.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// External repair tool invoked by the audit pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl AuditCommand {
    /// Split a command line on whitespace; `None` when blank.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
    pub command: Option<AuditCommand>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: AUDIT_TIMEOUT_SECS,
            command: None,
        }
    }
}

impl AuditConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub cache: CacheConfig,
    pub providers: Vec<ProviderConfig>,
    pub audit: AuditConfig,
    /// Streaming provider used when the model name matches no route.
    pub default_stream_provider: ProviderId,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            providers: ProviderId::ALL
                .into_iter()
                .map(ProviderConfig::defaults)
                .collect(),
            audit: AuditConfig::default(),
            default_stream_provider: ProviderId::Gemini,
        }
    }
}

impl OrchestratorConfig {
    /// Assemble from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Assemble from any variable lookup; used by [`from_env`](Self::from_env) and tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        for provider in &mut config.providers {
            if let Some(prefix) = credential_prefix(provider.id) {
                provider.credentials = discover_credentials(prefix, &lookup);
            }
            if provider.id == ProviderId::Ollama {
                if let Some(url) = lookup("OLLAMA_BASE_URL").filter(|v| !v.trim().is_empty()) {
                    provider.base_url = url.trim().to_string();
                }
                if let Some(model) = lookup("OLLAMA_MODEL").filter(|v| !v.trim().is_empty()) {
                    provider.model = model.trim().to_string();
                }
            }
        }
        if let Some(command) = lookup("CODEGEN_AUDIT_CMD").and_then(|c| AuditCommand::parse(&c)) {
            config.audit.enabled = true;
            config.audit.command = Some(command);
        }

        let summary: Vec<String> = config
            .providers
            .iter()
            .map(|p| format!("{}={}", p.id, p.credentials.len()))
            .collect();
        tracing::debug!(credentials = %summary.join(","), "configuration assembled from environment");

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid YAML: {}", e),
                ErrorContext::new().with_source("config"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config file: {}", e),
                ErrorContext::new()
                    .with_source("config")
                    .with_details(path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn provider(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn provider_mut(&mut self, id: ProviderId) -> Option<&mut ProviderConfig> {
        self.providers.iter_mut().find(|p| p.id == id)
    }

    /// Reject duplicate providers, bad URLs and nonsensical numbers.
    pub fn validate(&self) -> Result<()> {
        for (i, p) in self.providers.iter().enumerate() {
            let field = |name: &str| format!("providers[{}].{}", i, name);

            if self.providers[..i].iter().any(|q| q.id == p.id) {
                return Err(Error::configuration_with_context(
                    format!("provider '{}' is configured twice", p.id),
                    ErrorContext::new().with_field_path(field("id")),
                ));
            }
            match url::Url::parse(&p.base_url) {
                Ok(u) if matches!(u.scheme(), "http" | "https") => {}
                Ok(u) => {
                    return Err(Error::configuration_with_context(
                        format!("unsupported URL scheme '{}'", u.scheme()),
                        ErrorContext::new()
                            .with_field_path(field("base_url"))
                            .with_details(p.base_url.clone()),
                    ))
                }
                Err(e) => {
                    return Err(Error::configuration_with_context(
                        format!("invalid base URL: {}", e),
                        ErrorContext::new()
                            .with_field_path(field("base_url"))
                            .with_details(p.base_url.clone()),
                    ))
                }
            }
            if p.model.trim().is_empty() {
                return Err(Error::configuration_with_context(
                    "model must not be empty",
                    ErrorContext::new().with_field_path(field("model")),
                ));
            }
            if p.timeout_secs == 0 {
                return Err(Error::configuration_with_context(
                    "timeout must be at least one second",
                    ErrorContext::new().with_field_path(field("timeout_secs")),
                ));
            }
        }

        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(Error::configuration_with_context(
                "cache capacity must be positive when caching is enabled",
                ErrorContext::new().with_field_path("cache.capacity"),
            ));
        }
        if !(0.0..=1.0).contains(&self.cache.fuzzy_threshold) {
            return Err(Error::configuration_with_context(
                "fuzzy threshold must be within 0..=1",
                ErrorContext::new().with_field_path("cache.fuzzy_threshold"),
            ));
        }
        if self.audit.timeout_secs == 0 {
            return Err(Error::configuration_with_context(
                "audit timeout must be at least one second",
                ErrorContext::new().with_field_path("audit.timeout_secs"),
            ));
        }
        if self.provider(self.default_stream_provider).is_none() {
            return Err(Error::configuration_with_context(
                format!(
                    "default stream provider '{}' is not configured",
                    self.default_stream_provider
                ),
                ErrorContext::new().with_field_path("default_stream_provider"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn numbered_keys_are_contiguous() {
        let lookup = env(&[
            ("GEMINI_API_KEY_1", "a"),
            ("GEMINI_API_KEY_2", "b"),
            ("GEMINI_API_KEY_4", "d"),
            ("GEMINI_API_KEY", "bare"),
        ]);
        assert_eq!(discover_credentials("GEMINI_API_KEY", lookup), vec!["a", "b"]);
    }

    #[test]
    fn bare_key_used_without_numbered_keys() {
        let lookup = env(&[("GROQ_API_KEY", "only")]);
        assert_eq!(discover_credentials("GROQ_API_KEY", lookup), vec!["only"]);
    }

    #[test]
    fn no_keys_gives_empty_pool() {
        assert!(discover_credentials("OPENAI_API_KEY", env(&[])).is_empty());
    }

    #[test]
    fn numbered_keys_are_capped() {
        let pairs: Vec<(String, String)> = (1..=40)
            .map(|i| (format!("K_{}", i), format!("v{}", i)))
            .collect();
        let map: HashMap<String, String> = pairs.into_iter().collect();
        let keys = discover_credentials("K", |n| map.get(n).cloned());
        assert_eq!(keys.len(), MAX_NUMBERED_CREDENTIALS);
    }

    #[test]
    fn from_lookup_overrides_ollama() {
        let config = OrchestratorConfig::from_lookup(env(&[
            ("OLLAMA_BASE_URL", "http://gpu-box:11434"),
            ("OLLAMA_MODEL", "deepseek-coder"),
            ("ANTHROPIC_API_KEY_1", "sk-ant-1"),
        ]))
        .unwrap();
        let ollama = config.provider(ProviderId::Ollama).unwrap();
        assert_eq!(ollama.base_url, "http://gpu-box:11434");
        assert_eq!(ollama.model, "deepseek-coder");
        assert_eq!(ollama.timeout_secs, LOCAL_TIMEOUT_SECS);
        assert_eq!(
            config.provider(ProviderId::Anthropic).unwrap().credentials,
            vec!["sk-ant-1"]
        );
        assert!(!config.audit.enabled);
    }

    #[test]
    fn audit_command_from_env() {
        let config =
            OrchestratorConfig::from_lookup(env(&[("CODEGEN_AUDIT_CMD", "fixer --quiet")])).unwrap();
        assert!(config.audit.enabled);
        assert_eq!(
            config.audit.command,
            Some(AuditCommand {
                program: "fixer".into(),
                args: vec!["--quiet".into()]
            })
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = OrchestratorConfig::from_lookup(env(&[("OLLAMA_BASE_URL", "not a url")]))
            .unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("providers[0].base_url")
        );
    }

    #[test]
    fn yaml_partial_config_uses_defaults() {
        let yaml = r#"
cache:
  capacity: 10
providers:
  - id: groq
    base_url: https://api.groq.com/openai/v1
    model: llama-3.1-8b-instant
    credentials: ["g1"]
    timeout_secs: 30
    priority: 0
    fallback: true
default_stream_provider: groq
"#;
        let config = OrchestratorConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.cache.capacity, 10);
        assert_eq!(config.cache.ttl, Duration::from_secs(3600));
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.audit.timeout_secs, AUDIT_TIMEOUT_SECS);
    }

    #[test]
    fn default_stream_provider_must_exist() {
        let yaml = "providers: []\ndefault_stream_provider: gemini\n";
        assert!(OrchestratorConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn debug_hides_credentials() {
        let p = ProviderConfig::defaults(ProviderId::Gemini).with_credentials(["super-secret"]);
        assert!(!format!("{:?}", p).contains("super-secret"));
    }
}
