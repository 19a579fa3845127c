//! Crate-wide error type.
//!
//! Low-level failures are folded into a few variants the orchestrator acts on; use
//! [`Error::class`] to decide what happens to the credential and the fallback chain.

use crate::error_code::ErrorClass;
use crate::pipeline::PipelineError;
use crate::resilience::PoolError;
use crate::transport::TransportError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Where an error came from: a field path such as `files[0].path` or
/// `providers[1].base_url`, free-form details, and the component that raised it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub field_path: Option<String>,
    pub details: Option<String>,
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(self, path: impl Into<String>) -> Self {
        Self {
            field_path: Some(path.into()),
            ..self
        }
    }

    pub fn with_details(self, details: impl Into<String>) -> Self {
        Self {
            details: Some(details.into()),
            ..self
        }
    }

    pub fn with_source(self, source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..self
        }
    }

    fn is_empty(&self) -> bool {
        self.field_path.is_none() && self.details.is_none() && self.source.is_none()
    }
}

/// Renders as ` (field: .., details: .., source: ..)`, or nothing when empty.
impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        let labelled = [
            ("field", &self.field_path),
            ("details", &self.details),
            ("source", &self.source),
        ];
        let parts: Vec<String> = labelled
            .iter()
            .filter_map(|(label, value)| value.as_ref().map(|v| format!("{}: {}", label, v)))
            .collect();
        write!(f, " ({})", parts.join(", "))
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Stream decoding failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("Invalid configuration: {message}{context}")]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Invalid payload: {message}{context}")]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("{message}{context}")]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Non-2xx answer from a provider, already classified.
    #[error("Provider returned HTTP {status} ({class}): {message}")]
    Remote {
        status: u16,
        class: String,
        message: String,
        retryable: bool,
        fallbackable: bool,
        retry_after_ms: Option<u32>,
    },
}

impl Error {
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Build a classified remote error from an HTTP status and response body.
    pub fn remote(status: u16, message: impl Into<String>, retry_after_ms: Option<u32>) -> Self {
        let class = ErrorClass::from_http_status(status);
        Error::Remote {
            status,
            class: class.name().to_string(),
            message: message.into(),
            retryable: class.retryable(),
            fallbackable: class.fallbackable(),
            retry_after_ms,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Classification used by the fallback loop.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Remote { status, .. } => ErrorClass::from_http_status(*status),
            Error::Transport(TransportError::Timeout(_)) => ErrorClass::Timeout,
            Error::Transport(_) => ErrorClass::Unreachable,
            Error::Pool(_) => ErrorClass::RateLimited,
            Error::Validation { .. } | Error::Serialization(_) | Error::Pipeline(_) => {
                ErrorClass::MalformedOutput
            }
            _ => ErrorClass::Unknown,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.class() == ErrorClass::RateLimited
    }

    /// Provider-suggested wait before the same credential may be used again.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::Remote {
                retry_after_ms: Some(ms),
                ..
            } => Some(Duration::from_millis(u64::from(*ms))),
            _ => None,
        }
    }
}
