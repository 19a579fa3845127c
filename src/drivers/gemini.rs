//! Gemini Generate API 驱动 — 实现 Google Gemini 特有的请求/响应格式转换
//!
//! Google Gemini generateContent API driver. Key differences:
//! - Uses `contents` with `parts`; the system prompt goes to `system_instruction`.
//! - The model name is part of the URL path, not the body.
//! - Streaming uses `:streamGenerateContent?alt=sse`, each frame a full response chunk.
//! - The API key travels in the `x-goog-api-key` header.

use serde_json::{json, Value};

use crate::pipeline::Framing;
use crate::Result;

use super::{text_at, DriverRequest, Prompt, ProviderDriver, ProviderId};

const TEXT_POINTER: &str = "/candidates/0/content/parts/0/text";

#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiDriver;

impl ProviderDriver for GeminiDriver {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Gemini
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
        let path = if stream {
            format!("/v1beta/models/{}:streamGenerateContent?alt=sse", model)
        } else {
            format!("/v1beta/models/{}:generateContent", model)
        };

        let mut body = json!({
            "system_instruction": { "parts": [{ "text": prompt.system }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt.user }] }],
        });
        if !stream {
            body["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }

        let headers = secret
            .map(|s| vec![("x-goog-api-key", s.to_string())])
            .unwrap_or_default();

        Ok(DriverRequest { path, headers, body })
    }

    fn parse_response(&self, body: &Value) -> Result<String> {
        text_at(body, TEXT_POINTER)
    }

    fn parse_stream_delta(&self, frame: &Value) -> Result<Option<String>> {
        // Only the first part is text; later parts and the closing chunk may be metadata.
        Ok(frame
            .pointer(TEXT_POINTER)
            .and_then(|v| v.as_str())
            .map(String::from))
    }
}
