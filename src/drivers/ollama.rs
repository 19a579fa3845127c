//! Ollama 本地推理驱动
//!
//! Local model runner driver. `/api/generate` with the system prompt as a separate
//! field; streaming responses are NDJSON with the text under `response` and a final
//! object carrying `done: true`.

use serde_json::{json, Value};

use crate::pipeline::Framing;
use crate::Result;

use super::{text_at, DriverRequest, Prompt, ProviderDriver, ProviderId};

#[derive(Debug, Clone, Copy, Default)]
pub struct OllamaDriver;

impl ProviderDriver for OllamaDriver {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    fn framing(&self) -> Framing {
        Framing::Ndjson
    }

    fn build_request(
        &self,
        prompt: &Prompt,
        model: &str,
        stream: bool,
        _secret: Option<&str>,
    ) -> Result<DriverRequest> {
        let mut body = json!({
            "model": model,
            "system": prompt.system,
            "prompt": prompt.user,
            "stream": stream,
        });
        if !stream {
            body["format"] = json!("json");
        }
        Ok(DriverRequest {
            path: "/api/generate".into(),
            headers: Vec::new(),
            body,
        })
    }

    fn parse_response(&self, body: &Value) -> Result<String> {
        text_at(body, "/response")
    }

    fn parse_stream_delta(&self, frame: &Value) -> Result<Option<String>> {
        Ok(frame
            .get("response")
            .and_then(|v| v.as_str())
            .map(String::from))
    }

    fn reachability_path(&self) -> Option<&'static str> {
        Some("/api/tags")
    }
}
