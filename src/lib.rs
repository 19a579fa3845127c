//! # ai-codegen
//!
//! 代码生成编排库：缓存、凭证池轮换、多厂商降级与流式文件事件重建。
//!
//! Code generation orchestrator. A natural-language prompt goes in; generated source
//! files come out, produced by one of several interchangeable text-generation backends.
//!
//! ## Overview
//!
//! - **Cache first**: exact and fuzzy prompt lookup avoids repeat provider calls
//! - **Credential rotation**: each provider owns a pool of keys with a health state machine
//! - **Provider fallback**: local runner, then free cloud tiers, in priority order
//! - **Streaming**: chunked provider output is rebuilt into discrete file events
//! - **Silent audit**: an optional external tool repairs obvious errors before return
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_codegen::{GenerationRequest, Orchestrator, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> ai_codegen::Result<()> {
//!     let orchestrator = Orchestrator::from_config(&OrchestratorConfig::from_env()?)?;
//!
//!     let request = GenerationRequest::new("Create a TypeScript function to debounce user input");
//!     let result = orchestrator.generate_code(&request).await;
//!     for file in &result.files {
//!         println!("{} ({} bytes)", file.path, file.content.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`orchestrator`] | Entry points: generate, stream, edit, health |
//! | [`cache`] | Response cache with pluggable backends |
//! | [`resilience`] | Per-provider credential pools |
//! | [`drivers`] | Provider adapters (Ollama, Gemini, Groq, OpenAI, Anthropic) |
//! | [`registry`] | Provider profiles and model routing |
//! | [`pipeline`] | Stream framing decoders and event reconstruction |
//! | [`structured`] | JSON extraction and payload validation |
//! | [`audit`] | Silent audit pass over generated files |
//! | [`transport`] | HTTP transport |
//! | [`config`] | Typed configuration |
//! | [`types`] | Requests, results, files and stream events |

pub mod audit;
pub mod cache;
pub mod config;
pub mod drivers;
pub mod error_code;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;
pub mod resilience;
pub mod structured;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use config::OrchestratorConfig;
pub use drivers::ProviderId;
pub use orchestrator::{EventStream, HealthReport, HealthStatus, Orchestrator};
pub use types::{
    encode_event, EditRequest, GeneratedFile, GenerationRequest, GenerationResult, GenerationStats,
    StreamEvent,
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A specialized Result for pipeline operations
pub type PipeResult<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `PipeResult<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = PipeResult<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
