//! Provider framing decoders (Bytes -> JSON Value)
//!
//! Providers deliver their answers either as SSE (`data: {...}` frames separated by a
//! blank line) or as NDJSON (one object per line). These decoders only undo that
//! framing; extracting the text delta from each frame is the driver's job.

use crate::pipeline::{Decoder, PipelineError};
use crate::{BoxStream, PipeResult};
use bytes::Bytes;
use futures::{stream, StreamExt};
use serde_json::Value;

/// Splits a growing text buffer into complete frames on `delimiter`.
/// `\r\n` is folded to `\n` on the way in.
struct FrameBuffer {
    buf: String,
    /// Trailing bytes of a UTF-8 sequence split across chunks.
    pending: Vec<u8>,
    delimiter: &'static str,
}

impl FrameBuffer {
    fn new(delimiter: &'static str) -> Self {
        Self {
            buf: String::new(),
            pending: Vec::new(),
            delimiter,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        let keep = match std::str::from_utf8(&self.pending) {
            Ok(_) => 0,
            Err(e) if e.error_len().is_none() => self.pending.len() - e.valid_up_to(),
            Err(_) => 0,
        };
        let tail = self.pending.split_off(self.pending.len() - keep);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = tail;

        if text.contains('\r') {
            self.buf.push_str(&text.replace("\r\n", "\n"));
        } else {
            self.buf.push_str(&text);
        }
    }

    fn next_frame(&mut self) -> Option<String> {
        let idx = self.buf.find(self.delimiter)?;
        let frame = self.buf[..idx].to_string();
        self.buf.drain(..idx + self.delimiter.len());
        Some(frame)
    }

    fn take_rest(&mut self) -> String {
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.buf.push_str(&String::from_utf8_lossy(&tail));
        }
        std::mem::take(&mut self.buf)
    }
}

/// SSE decoder:
/// - splits by a blank line
/// - joins the frame's `data:` lines, ignoring `event:`/`id:` fields and `:` comments
/// - stops on `[DONE]`
pub struct SseDecoder {
    done_signal: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            done_signal: "[DONE]".to_string(),
        }
    }

    pub fn with_done_signal(mut self, signal: impl Into<String>) -> Self {
        self.done_signal = signal.into();
        self
    }

    /// Payload of one SSE frame, or `None` for frames without data.
    fn frame_data(frame: &str) -> Option<String> {
        let data: Vec<&str> = frame
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
            .collect();
        if data.is_empty() {
            None
        } else {
            Some(data.join("\n"))
        }
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Decoder for SseDecoder {
    async fn decode_stream(
        &self,
        input: BoxStream<'static, Bytes>,
    ) -> PipeResult<BoxStream<'static, Value>> {
        let done_signal = self.done_signal.clone();

        let stream = stream::unfold(
            (input, FrameBuffer::new("\n\n"), false),
            move |(mut input, mut frames, mut eof)| {
                let done_signal = done_signal.clone();
                async move {
                    loop {
                        let frame = match frames.next_frame() {
                            Some(f) => Some(f),
                            None if eof => {
                                let rest = frames.take_rest();
                                if rest.trim().is_empty() {
                                    return None;
                                }
                                Some(rest)
                            }
                            None => None,
                        };

                        if let Some(frame) = frame {
                            let Some(data) = Self::frame_data(&frame) else {
                                continue;
                            };
                            let data = data.trim();
                            if data == done_signal {
                                return None;
                            }
                            if data.is_empty() {
                                continue;
                            }
                            match serde_json::from_str::<Value>(data) {
                                Ok(v) => return Some((Ok(v), (input, frames, eof))),
                                Err(e) => {
                                    tracing::debug!(error = %e, "skipping non-JSON SSE frame");
                                    continue;
                                }
                            }
                        }

                        match input.next().await {
                            Some(Ok(bytes)) => frames.push(&bytes),
                            Some(Err(e)) => return Some((Err(e), (input, frames, eof))),
                            None => eof = true,
                        }
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}

/// NDJSON / JSONL decoder (one JSON object per line).
pub struct NdjsonDecoder;

#[async_trait::async_trait]
impl Decoder for NdjsonDecoder {
    async fn decode_stream(
        &self,
        input: BoxStream<'static, Bytes>,
    ) -> PipeResult<BoxStream<'static, Value>> {
        let stream = stream::unfold(
            (input, FrameBuffer::new("\n"), false),
            move |(mut input, mut lines, mut eof)| async move {
                loop {
                    let line = match lines.next_frame() {
                        Some(l) => Some(l),
                        None if eof => {
                            let rest = lines.take_rest();
                            if rest.trim().is_empty() {
                                return None;
                            }
                            Some(rest)
                        }
                        None => None,
                    };

                    if let Some(line) = line {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        let item = serde_json::from_str::<Value>(line).map_err(|e| {
                            crate::Error::from(PipelineError::Decoder(format!(
                                "invalid NDJSON line: {}",
                                e
                            )))
                        });
                        return Some((item, (input, lines, eof)));
                    }

                    match input.next().await {
                        Some(Ok(bytes)) => lines.push(&bytes),
                        Some(Err(e)) => return Some((Err(e), (input, lines, eof))),
                        None => eof = true,
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}
