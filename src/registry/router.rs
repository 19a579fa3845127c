//! Model name → provider routing for the streaming path.

use serde::Serialize;

use crate::drivers::ProviderId;

/// Ordered `(prefix, provider, strip)` rows; the first matching prefix wins.
/// Namespace prefixes are removed before the model name is sent.
const ROUTES: &[(&str, ProviderId, bool)] = &[
    ("ollama/", ProviderId::Ollama, true),
    ("groq/", ProviderId::Groq, true),
    ("claude", ProviderId::Anthropic, false),
    ("gpt", ProviderId::OpenAi, false),
    ("o1", ProviderId::OpenAi, false),
    ("o3", ProviderId::OpenAi, false),
    ("o4", ProviderId::OpenAi, false),
    ("gemini", ProviderId::Gemini, false),
    ("llama", ProviderId::Groq, false),
    ("mixtral", ProviderId::Groq, false),
];

/// Where a model name goes, and the name the provider should receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub provider: ProviderId,
    /// `None` means the provider's configured default model.
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ModelRouter {
    default_provider: ProviderId,
}

impl ModelRouter {
    pub fn new(default_provider: ProviderId) -> Self {
        Self { default_provider }
    }

    pub fn default_provider(&self) -> ProviderId {
        self.default_provider
    }

    /// Table lookup only; `None` when no prefix matches.
    pub fn lookup(&self, model: &str) -> Option<Route> {
        let trimmed = model.trim();
        let lower = trimmed.to_ascii_lowercase();
        ROUTES
            .iter()
            .find(|(prefix, _, _)| lower.starts_with(prefix))
            .map(|(prefix, provider, strip)| {
                let name = if *strip { &trimmed[prefix.len()..] } else { trimmed };
                Route {
                    provider: *provider,
                    model: (!name.is_empty()).then(|| name.to_string()),
                }
            })
    }

    /// Lookup falling back to the default provider with its default model.
    pub fn route(&self, model: Option<&str>) -> Route {
        model
            .filter(|m| !m.trim().is_empty())
            .and_then(|m| self.lookup(m))
            .unwrap_or(Route {
                provider: self.default_provider,
                model: None,
            })
    }
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::new(ProviderId::Gemini)
    }
}
