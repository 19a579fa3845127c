//! Stream reconstruction (arbitrarily chunked bytes -> StreamEvent)
//!
//! Network delivery may split one event record across chunks or pack several records
//! into one chunk. [`StreamReconstructor`] keeps an accumulation buffer across chunks
//! and only emits an event once its whole `data: <json>` line is present.

use crate::types::events::{StreamEvent, EVENT_PREFIX};
use crate::{BoxStream, PipeResult};
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::collections::VecDeque;

/// Incremental decoder for the `data: <json>` event wire format.
///
/// - Complete candidate lines that parse are emitted in order, exactly once.
/// - A candidate that does not parse, or a non-empty line without the prefix, is kept
///   together with every line after it until more bytes arrive.
/// - A candidate followed by unprefixed lines is retried as one record with the line
///   breaks escaped, which recovers records whose strings contain raw newlines.
/// - Lines starting with `:` are SSE comments (keep-alives from proxies and hosted
///   backends) and are dropped like blank lines instead of holding back the buffer.
/// - [`finish`](Self::finish) makes one last attempt over whatever is left.
#[derive(Debug)]
pub struct StreamReconstructor {
    prefix: String,
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
}

impl StreamReconstructor {
    pub fn new() -> Self {
        Self::with_prefix(EVENT_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            buffer: String::new(),
            pending: Vec::new(),
        }
    }

    /// Feed one chunk; returns the events it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.decode_utf8(chunk);
        self.drain(false)
    }

    /// End of stream: flush the remaining buffer once.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.buffer.push_str(&String::from_utf8_lossy(&rest));
        }
        self.drain(true)
    }

    /// Bytes still waiting for the rest of their record.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        match std::str::from_utf8(&self.pending) {
            Ok(s) => {
                self.buffer.push_str(s);
                self.pending.clear();
            }
            // Incomplete multi-byte sequence at the end: keep it for the next chunk.
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                self.buffer
                    .push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                self.pending.drain(..valid);
            }
            Err(_) => {
                self.buffer.push_str(&String::from_utf8_lossy(&self.pending));
                self.pending.clear();
            }
        }
    }

    fn drain(&mut self, eof: bool) -> Vec<StreamEvent> {
        let text = std::mem::take(&mut self.buffer);
        let mut lines: Vec<&str> = text.split('\n').collect();
        // The last segment has no newline yet; it can only be judged at end of stream.
        let tail = if eof { None } else { lines.pop() };

        let mut events = Vec::new();
        let mut i = 0;
        let mut retained_from = None;
        while i < lines.len() {
            let line = lines[i].trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with(':') {
                i += 1;
                continue;
            }
            if let Some(ev) = self.parse_line(line) {
                events.push(ev);
                i += 1;
                continue;
            }
            if line.starts_with(&self.prefix) {
                if let Some((ev, consumed)) = self.parse_joined(&lines[i..]) {
                    events.push(ev);
                    i += consumed;
                    continue;
                }
            }
            if eof {
                tracing::debug!(line = %truncate(line, 80), "dropping unparseable line at end of stream");
                i += 1;
                continue;
            }
            retained_from = Some(i);
            break;
        }

        let mut rest: Vec<&str> = match retained_from {
            Some(from) => lines[from..].to_vec(),
            None => Vec::new(),
        };
        if let Some(tail) = tail {
            rest.push(tail);
        }
        self.buffer = rest.join("\n");
        events
    }

    fn parse_line(&self, line: &str) -> Option<StreamEvent> {
        let payload = line.strip_prefix(&self.prefix)?;
        serde_json::from_str(payload.trim()).ok()
    }

    /// Try `lines[0]` joined with the unprefixed lines after it. Returns the event and
    /// how many lines it spans.
    fn parse_joined(&self, lines: &[&str]) -> Option<(StreamEvent, usize)> {
        let mut joined = lines.first()?.trim_end_matches('\r').to_string();
        for (n, next) in lines.iter().enumerate().skip(1) {
            let next = next.trim_end_matches('\r');
            if next.starts_with(&self.prefix) {
                return None;
            }
            joined.push_str("\\n");
            joined.push_str(next);
            if let Some(ev) = self.parse_line(&joined) {
                return Some((ev, n + 1));
            }
        }
        None
    }
}

impl Default for StreamReconstructor {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Lazily reconstruct events from a byte stream. Transport errors are passed through.
pub fn reconstruct(input: BoxStream<'static, Bytes>) -> BoxStream<'static, StreamEvent> {
    let stream = stream::unfold(
        (input, StreamReconstructor::new(), VecDeque::new(), false),
        |(mut input, mut rec, mut ready, mut eof)| async move {
            loop {
                if let Some(ev) = ready.pop_front() {
                    return Some((Ok(ev), (input, rec, ready, eof)));
                }
                if eof {
                    return None;
                }
                match input.next().await {
                    Some(Ok(bytes)) => ready.extend(rec.push(&bytes)),
                    Some(Err(e)) => return Some((Err(e), (input, rec, ready, eof))),
                    None => {
                        ready.extend(rec.finish());
                        eof = true;
                    }
                }
            }
        },
    );
    Box::pin(stream) as BoxStream<'static, StreamEvent>
}

/// Collect every event of a finished stream; errors abort collection.
pub async fn collect_events(
    input: BoxStream<'static, Bytes>,
) -> PipeResult<Vec<StreamEvent>> {
    let mut out = Vec::new();
    let mut events = reconstruct(input);
    while let Some(ev) = events.next().await {
        out.push(ev?);
    }
    Ok(out)
}
