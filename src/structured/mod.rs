//! Structured output module: turns raw model text into a validated file set.
//!
//! - [`extract_json`]: pull the JSON object out of fenced or chatty model text
//! - [`PayloadValidator`]: check the object against the [`GeneratedPayload`] schema
//!
//! # Examples
//!
//! ```
//! use ai_codegen::structured::PayloadValidator;
//!
//! let validator = PayloadValidator::new().unwrap();
//! let text = "Here you go:\n```json\n{\"files\":[{\"path\":\"main.py\",\"content\":\"print(1)\"}]}\n```";
//! let payload = validator.parse(text).unwrap();
//!
//! assert_eq!(payload.files[0].language, "python");
//! ```
//!
//! [`GeneratedPayload`]: crate::types::GeneratedPayload

pub mod extract;
pub mod validator;

pub use extract::extract_json;
pub use validator::PayloadValidator;
