//! Provider 驱动抽象层 — 每个后端一个适配器，统一调用契约
//!
//! Provider driver layer. Each backend API style has a [`ProviderDriver`] that knows
//! how to build a request and where the generated text lives in the response. An
//! [`HttpProvider`] binds a driver to an [`HttpTransport`] and a default model and
//! exposes the uniform async [`Provider`] contract the orchestrator calls.

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod prompt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::pipeline::{create_decoder, Framing};
use crate::resilience::CredentialLease;
use crate::transport::HttpTransport;
use crate::{BoxStream, Result};

pub use anthropic::AnthropicDriver;
pub use gemini::GeminiDriver;
pub use ollama::OllamaDriver;
pub use openai::OpenAiDriver;
pub use prompt::Prompt;

/// Timeout of the local runner reachability check.
const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(2);

/// Closed set of supported backends. Declaration order breaks priority ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Local model runner
    Ollama,
    /// Free cloud tier with credential rotation
    Gemini,
    /// Secondary free cloud tier
    Groq,
    /// Paid backend, reached by model name only
    #[serde(rename = "openai")]
    OpenAi,
    /// Paid backend, reached by model name only
    Anthropic,
}

impl ProviderId {
    pub const ALL: [ProviderId; 5] = [
        ProviderId::Ollama,
        ProviderId::Gemini,
        ProviderId::Groq,
        ProviderId::OpenAi,
        ProviderId::Anthropic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Ollama => "ollama",
            ProviderId::Gemini => "gemini",
            ProviderId::Groq => "groq",
            ProviderId::OpenAi => "openai",
            ProviderId::Anthropic => "anthropic",
        }
    }

    /// Whether calls need a secret from the credential pool.
    pub fn requires_credential(&self) -> bool {
        !matches!(self, ProviderId::Ollama)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ProviderId::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::configuration_with_context(
                    format!("unknown provider '{}'", s),
                    crate::ErrorContext::new().with_details("expected one of: ollama, gemini, groq, openai, anthropic"),
                )
            })
    }
}

/// Provider-specific HTTP request, relative to the provider base URL.
#[derive(Debug, Clone)]
pub struct DriverRequest {
    pub path: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

/// Core trait for provider-specific API adaptation.
///
/// Implementations are pure: they build requests and read responses, and never do I/O.
pub trait ProviderDriver: Send + Sync + fmt::Debug {
    fn provider_id(&self) -> ProviderId;

    /// Framing of the streaming response body.
    fn framing(&self) -> Framing;

    fn build_request(
        &self,
        prompt: &Prompt,
        model: &str,
        stream: bool,
        secret: Option<&str>,
    ) -> Result<DriverRequest>;

    /// Generated text of a non-streaming response.
    fn parse_response(&self, body: &Value) -> Result<String>;

    /// Text delta carried by one streaming frame, if any.
    fn parse_stream_delta(&self, frame: &Value) -> Result<Option<String>>;

    /// Cheap GET used to check the backend is up, for backends that may not be running.
    fn reachability_path(&self) -> Option<&'static str> {
        None
    }
}

/// Uniform call contract the orchestrator drives.
#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Model used when the caller gives none.
    fn default_model(&self) -> &str;

    /// Whether the backend can currently be reached.
    async fn is_reachable(&self) -> bool {
        true
    }

    /// One-shot generation; returns the model's raw text.
    async fn complete(&self, prompt: &Prompt, credential: Option<&CredentialLease>) -> Result<String>;

    /// Streaming generation; returns the model's text as it arrives.
    async fn stream(
        &self,
        prompt: &Prompt,
        credential: Option<&CredentialLease>,
    ) -> Result<BoxStream<'static, Bytes>>;
}

/// A [`ProviderDriver`] bound to its HTTP endpoint.
#[derive(Debug)]
pub struct HttpProvider {
    driver: Arc<dyn ProviderDriver>,
    transport: HttpTransport,
    model: String,
}

impl HttpProvider {
    pub fn new(driver: Box<dyn ProviderDriver>, transport: HttpTransport, model: impl Into<String>) -> Self {
        Self {
            driver: Arc::from(driver),
            transport,
            model: model.into(),
        }
    }

    fn request(
        &self,
        prompt: &Prompt,
        stream: bool,
        credential: Option<&CredentialLease>,
    ) -> Result<DriverRequest> {
        let model = prompt.model.as_deref().unwrap_or(&self.model);
        self.driver
            .build_request(prompt, model, stream, credential.map(|c| c.secret()))
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn id(&self) -> ProviderId {
        self.driver.provider_id()
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn is_reachable(&self) -> bool {
        match self.driver.reachability_path() {
            Some(path) => match self.transport.ping(path, REACHABILITY_TIMEOUT).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(provider = %self.id(), error = %e, "reachability check failed");
                    false
                }
            },
            None => true,
        }
    }

    async fn complete(&self, prompt: &Prompt, credential: Option<&CredentialLease>) -> Result<String> {
        let req = self.request(prompt, false, credential)?;
        let body = self
            .transport
            .post_json(&req.path, &req.headers, &req.body)
            .await?;
        self.driver.parse_response(&body)
    }

    async fn stream(
        &self,
        prompt: &Prompt,
        credential: Option<&CredentialLease>,
    ) -> Result<BoxStream<'static, Bytes>> {
        let req = self.request(prompt, true, credential)?;
        let body = self
            .transport
            .post_stream(&req.path, &req.headers, &req.body)
            .await?;
        let frames = create_decoder(self.driver.framing())
            .decode_stream(body)
            .await?;

        let extractor = Arc::clone(&self.driver);
        let text = frames.filter_map(move |frame| {
            let delta = frame.and_then(|f| extractor.parse_stream_delta(&f));
            futures::future::ready(match delta {
                Ok(Some(text)) if !text.is_empty() => Some(Ok(Bytes::from(text))),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
        });
        Ok(Box::pin(text))
    }
}

/// Factory: the driver implementing a provider's API style.
pub fn create_driver(provider: ProviderId) -> Box<dyn ProviderDriver> {
    match provider {
        ProviderId::Ollama => Box::new(OllamaDriver),
        ProviderId::Gemini => Box::new(GeminiDriver),
        ProviderId::Groq => Box::new(OpenAiDriver::new(ProviderId::Groq)),
        ProviderId::OpenAi => Box::new(OpenAiDriver::new(ProviderId::OpenAi)),
        ProviderId::Anthropic => Box::new(AnthropicDriver),
    }
}

/// First string found at `pointer`, or a `MissingField` error naming it.
pub(crate) fn text_at(body: &Value, pointer: &str) -> Result<String> {
    body.pointer(pointer)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| {
            crate::pipeline::PipelineError::MissingField {
                name: pointer.to_string(),
                hint: None,
            }
            .with_hint("the provider answered without generated text; check the model name and safety settings")
            .into()
        })
}
