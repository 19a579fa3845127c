//! Payload validator for generated file sets.
//!
//! The schema is derived from [`GeneratedPayload`] with schemars and compiled once with
//! jsonschema (Draft 7). Checks that JSON Schema cannot express, such as a path made of
//! whitespace, are done explicitly afterwards.

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use super::extract::extract_json;
use crate::types::{GeneratedFile, GeneratedPayload};
use crate::{Error, ErrorContext, Result};

const SOURCE: &str = "payload_validator";

/// Validator for model output that should describe a file set.
pub struct PayloadValidator {
    schema: JSONSchema,
}

impl std::fmt::Debug for PayloadValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadValidator").finish_non_exhaustive()
    }
}

impl PayloadValidator {
    pub fn new() -> Result<Self> {
        let schema_value = serde_json::to_value(schemars::schema_for!(GeneratedPayload))?;
        let schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema_value)
            .map_err(|e| {
                Error::configuration_with_context(
                    format!("failed to compile payload schema: {}", e),
                    ErrorContext::new().with_source(SOURCE),
                )
            })?;
        Ok(Self { schema })
    }

    /// Check a JSON value against the payload schema.
    pub fn validate(&self, value: &Value) -> Result<()> {
        if let Err(errors) = self.schema.validate(value) {
            let mut first_path = None;
            let messages: Vec<String> = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    first_path.get_or_insert_with(|| path.clone());
                    format!("{} at '{}'", e, path)
                })
                .collect();
            let mut ctx = ErrorContext::new().with_source(SOURCE);
            if let Some(path) = first_path {
                ctx = ctx.with_field_path(path);
            }
            return Err(Error::validation_with_context(messages.join("; "), ctx));
        }
        Ok(())
    }

    /// Extract, validate and decode a payload from raw model text.
    ///
    /// A bare JSON array is accepted as the file list. Languages left blank are inferred
    /// from the file extension.
    pub fn parse(&self, text: &str) -> Result<GeneratedPayload> {
        let json = extract_json(text).ok_or_else(|| {
            Error::validation_with_context(
                "model output contains no JSON",
                ErrorContext::new()
                    .with_source(SOURCE)
                    .with_details(preview(text)),
            )
        })?;

        let mut value: Value = serde_json::from_str(json)?;
        if value.is_array() {
            value = serde_json::json!({ "files": value });
        }
        self.validate(&value)?;

        let payload: GeneratedPayload = serde_json::from_value(value)?;
        check_files(&payload.files)?;
        Ok(payload.with_inferred_languages())
    }
}

fn check_files(files: &[GeneratedFile]) -> Result<()> {
    for (i, f) in files.iter().enumerate() {
        if f.path.trim().is_empty() {
            return Err(Error::validation_with_context(
                "file path is blank",
                ErrorContext::new()
                    .with_field_path(format!("files[{}].path", i))
                    .with_source(SOURCE),
            ));
        }
        if f.content.trim().is_empty() {
            return Err(Error::validation_with_context(
                "file content is blank",
                ErrorContext::new()
                    .with_field_path(format!("files[{}].content", i))
                    .with_source(SOURCE),
            ));
        }
    }
    Ok(())
}

fn preview(text: &str) -> String {
    let head: String = text.chars().take(80).collect();
    if head.len() < text.len() {
        format!("{}...", head)
    } else {
        head
    }
}
