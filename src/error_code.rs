//! Error classes for provider failures.
//!
//! Every failure the fallback loop can observe is folded into one [`ErrorClass`].
//! The class decides what happens to the credential that was in use and whether
//! the orchestrator keeps walking the fallback chain.
//!
//! | Class | Credential outcome | Fallback |
//! |-------|--------------------|----------|
//! | `rate_limited` | rate-limited until `Retry-After` | yes |
//! | `authentication` | error (counts toward disable) | yes |
//! | `server_error` / `unknown` | error (counts toward disable) | yes |
//! | `overloaded` / `timeout` / `unreachable` | none (not the key's fault) | yes |
//! | `malformed_output` | none (the call succeeded) | yes |
//! | `invalid_request` | none (the prompt was refused) | yes |
//!
//! ## Example
//!
//! ```rust
//! use ai_codegen::error_code::ErrorClass;
//!
//! let class = ErrorClass::from_http_status(429);
//! assert_eq!(class.name(), "rate_limited");
//! assert!(class.retryable());
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Malformed request, or a prompt the backend refuses (400/404/413)
    InvalidRequest,
    /// Invalid, expired, or missing API key (401/403)
    Authentication,
    /// Request rate limit or free-tier quota exceeded (429)
    RateLimited,
    /// Internal server error on provider side
    ServerError,
    /// Provider service temporarily overloaded (503/529)
    Overloaded,
    /// Request timed out before a response was received
    Timeout,
    /// Connection refused or DNS failure; typical for a local runner that is not started
    Unreachable,
    /// The provider answered but the payload does not describe any files
    MalformedOutput,
    /// Error could not be classified
    Unknown,
}

impl ErrorClass {
    /// Returns the standard name (e.g., `"rate_limited"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Authentication => "authentication",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Overloaded => "overloaded",
            Self::Timeout => "timeout",
            Self::Unreachable => "unreachable",
            Self::MalformedOutput => "malformed_output",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the same credential may succeed if tried again later.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::Overloaded | Self::Timeout
        )
    }

    /// Whether another credential or provider should be tried.
    ///
    /// Every class falls back here: a different backend may accept a prompt the
    /// current one rejected.
    #[inline]
    pub fn fallbackable(&self) -> bool {
        true
    }

    /// Whether the failure counts against the credential's consecutive error budget.
    ///
    /// Network trouble, overload and refused prompts say nothing about the key, so
    /// only failures that may come from the credential itself are counted.
    #[inline]
    pub fn penalizes_credential(&self) -> bool {
        matches!(self, Self::Authentication | Self::ServerError | Self::Unknown)
    }

    /// Maps an HTTP status code to the most likely class.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 404 | 413 | 422 => Self::InvalidRequest,
            401 | 403 => Self::Authentication,
            408 | 504 => Self::Timeout,
            429 => Self::RateLimited,
            503 | 529 => Self::Overloaded,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
