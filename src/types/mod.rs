//! 类型系统模块：定义代码生成流水线的核心数据类型。
//!
//! # Types Module
//!
//! Core value types shared by every stage of the generation pipeline.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`GeneratedFile`] | One generated source file (path, content, language) |
//! | [`StreamEvent`] | Wire-level event emitted by the streaming entry point |
//! | [`GenerationRequest`] | Prompt plus optional model hint |
//! | [`EditRequest`] | Current files plus an edit instruction |
//! | [`GenerationResult`] | Non-streaming response, including soft failures |
//!
//! ## Submodules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`events`] | Stream events and the `data: <json>` wire codec |
//! | [`file`] | Generated files and language inference |
//! | [`generation`] | Requests, results and per-call statistics |

pub mod events;
pub mod file;
pub mod generation;

pub use events::{encode_event, StreamEvent, EVENT_PREFIX};
pub use file::{GeneratedFile, GeneratedPayload};
pub use generation::{EditRequest, GenerationRequest, GenerationResult, GenerationStats};
