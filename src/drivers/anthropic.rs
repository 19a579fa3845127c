//! Anthropic Messages API 驱动 — 实现 Claude 特有的请求/响应格式转换
//!
//! Anthropic Messages API driver. Key differences from OpenAI:
//! - System prompt is a top-level `system` field, not a message.
//! - `max_tokens` is required.
//! - Response text is `content[0].text`.
//! - Streaming emits typed SSE events; text arrives in `content_block_delta`.

use serde_json::{json, Value};

use crate::error::Error;
use crate::pipeline::Framing;
use crate::Result;

use super::{text_at, DriverRequest, Prompt, ProviderDriver, ProviderId};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;

#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicDriver;

impl ProviderDriver for AnthropicDriver {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Anthropic
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
        let body = json!({
            "model": model,
            "max_tokens": MAX_TOKENS,
            "system": prompt.system,
            "messages": [{ "role": "user", "content": prompt.user }],
            "stream": stream,
        });

        let mut headers = vec![("anthropic-version", ANTHROPIC_VERSION.to_string())];
        if let Some(s) = secret {
            headers.push(("x-api-key", s.to_string()));
        }

        Ok(DriverRequest {
            path: "/v1/messages".into(),
            headers,
            body,
        })
    }

    fn parse_response(&self, body: &Value) -> Result<String> {
        text_at(body, "/content/0/text")
    }

    fn parse_stream_delta(&self, frame: &Value) -> Result<Option<String>> {
        match frame.get("type").and_then(|t| t.as_str()) {
            Some("content_block_delta") => Ok(frame
                .pointer("/delta/text")
                .and_then(|v| v.as_str())
                .map(String::from)),
            // Mid-stream failures arrive as an event, not an HTTP status.
            Some("error") => {
                let kind = frame
                    .pointer("/error/type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("error");
                let message = frame
                    .pointer("/error/message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("stream error");
                let status = match kind {
                    "overloaded_error" => 529,
                    "rate_limit_error" => 429,
                    _ => 500,
                };
                Err(Error::remote(status, message, None))
            }
            _ => Ok(None),
        }
    }
}
