//! OpenAI 兼容 Chat Completions 驱动（Groq 与 OpenAI 共用）
//!
//! Chat Completions driver shared by every OpenAI-compatible backend. Bearer auth,
//! `choices[0].message.content` for complete responses and `choices[0].delta.content`
//! for SSE chunks. The `[DONE]` sentinel is consumed by the SSE decoder.

use serde_json::{json, Value};

use crate::pipeline::Framing;
use crate::Result;

use super::{text_at, DriverRequest, Prompt, ProviderDriver, ProviderId};

#[derive(Debug, Clone, Copy)]
pub struct OpenAiDriver {
    provider: ProviderId,
}

impl OpenAiDriver {
    pub fn new(provider: ProviderId) -> Self {
        Self { provider }
    }
}

impl ProviderDriver for OpenAiDriver {
    fn provider_id(&self) -> ProviderId {
        self.provider
    }

    fn framing(&self) -> Framing {
        Framing::Sse
    }

    fn build_request(
        &self,
        prompt: &Prompt,
        model: &str,
        stream: bool,
        secret: Option<&str>,
    ) -> Result<DriverRequest> {
        let mut body = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
            "stream": stream,
        });
        if !stream {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let headers = secret
            .map(|s| vec![("authorization", format!("Bearer {}", s))])
            .unwrap_or_default();

        Ok(DriverRequest {
            path: "/chat/completions".into(),
            headers,
            body,
        })
    }

    fn parse_response(&self, body: &Value) -> Result<String> {
        text_at(body, "/choices/0/message/content")
    }

    fn parse_stream_delta(&self, frame: &Value) -> Result<Option<String>> {
        Ok(frame
            .pointer("/choices/0/delta/content")
            .and_then(|v| v.as_str())
            .map(String::from))
    }
}
