//! 流水线处理模块：把厂商的分块网络响应还原为离散的结构化事件。
//!
//! # Streaming Pipeline
//!
//! Two stages turn a provider's HTTP body into [`StreamEvent`]s:
//!
//! ```text
//! HTTP bytes ──▶ framing Decoder ──▶ driver text delta ──▶ StreamReconstructor ──▶ events
//!               (SSE / NDJSON)      (per provider)        (data: <json> lines)
//! ```
//!
//! The model is asked to answer in the event wire format itself, so the concatenated
//! text deltas form exactly the byte stream the reconstructor understands.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Decoder`] | Trait for provider framing decoders |
//! | [`decode::SseDecoder`] | `data:` frames separated by blank lines |
//! | [`decode::NdjsonDecoder`] | One JSON object per line |
//! | [`StreamReconstructor`] | Incremental `data: <json>` event decoder |
//! | [`reconstruct`] | Lazy byte stream → event stream adapter |

pub mod decode;
pub mod reconstruct;


use crate::{BoxStream, PipeResult};
use serde::{Deserialize, Serialize};

pub use reconstruct::{collect_events, reconstruct, StreamReconstructor};

/// Decoder trait for provider stream framing
#[async_trait::async_trait]
pub trait Decoder: Send + Sync {
    /// Decode a byte stream into JSON values
    async fn decode_stream(
        &self,
        input: BoxStream<'static, bytes::Bytes>,
    ) -> PipeResult<BoxStream<'static, serde_json::Value>>;
}

/// How a provider frames its streaming body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    Sse,
    Ndjson,
}

pub fn create_decoder(framing: Framing) -> Box<dyn Decoder> {
    match framing {
        Framing::Sse => Box::new(decode::SseDecoder::new()),
        Framing::Ndjson => Box::new(decode::NdjsonDecoder),
    }
}

/// Failures while turning a provider body into frames or text.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("malformed frame: {0}")]
    Decoder(String),

    #[error("response has no `{name}`{}", .hint.as_ref().map(|h| format!(" ({})", h)).unwrap_or_default())]
    MissingField { name: String, hint: Option<String> },
}

impl PipelineError {
    /// Attach a hint to a `MissingField`; other variants are returned as is.
    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        match self {
            PipelineError::MissingField { name, .. } => PipelineError::MissingField {
                name,
                hint: Some(hint.into()),
            },
            other => other,
        }
    }
}
