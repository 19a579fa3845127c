//! Stream events and their wire encoding.
//!
//! On the wire every event is one line `data: <json>` followed by a blank line:
//!
//! ```text
//! data: {"type":"status","message":"Generating with gemini"}
//!
//! data: {"type":"file","path":"src/debounce.ts","content":"...","language":"typescript"}
//!
//! data: {"type":"complete"}
//! ```

use super::file::GeneratedFile;
use serde::{Deserialize, Serialize};

/// Reserved line prefix marking an event record.
pub const EVENT_PREFIX: &str = "data: ";

/// Unified streaming event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// A complete generated file
    File {
        path: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },

    /// Progress information for the caller
    Status { message: String },

    /// A failure that ended generation early
    Error { message: String },

    /// Terminal event; every stream ends with exactly one
    Complete,
}

impl StreamEvent {
    pub fn status(message: impl Into<String>) -> Self {
        StreamEvent::Status {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    /// The generated file carried by a `File` event.
    pub fn as_file(&self) -> Option<GeneratedFile> {
        match self {
            StreamEvent::File {
                path,
                content,
                language,
            } => Some(GeneratedFile::with_language(
                path.clone(),
                content.clone(),
                language.clone(),
            )),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, StreamEvent::Complete)
    }
}

impl From<GeneratedFile> for StreamEvent {
    fn from(file: GeneratedFile) -> Self {
        StreamEvent::File {
            path: file.path,
            content: file.content,
            language: Some(file.language),
        }
    }
}

/// Encode an event as one wire record, including the blank separator line.
pub fn encode_event(event: &StreamEvent) -> String {
    // Serializing these variants cannot fail: all fields are strings.
    let json = serde_json::to_string(event).unwrap_or_else(|_| r#"{"type":"complete"}"#.into());
    format!("{}{}\n\n", EVENT_PREFIX, json)
}
