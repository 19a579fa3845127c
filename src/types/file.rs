//! Generated files.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One generated source file. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedFile {
    #[schemars(length(min = 1))]
    pub path: String,
    #[schemars(length(min = 1))]
    pub content: String,
    #[serde(default)]
    pub language: String,
}

impl GeneratedFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_language(path, content, None)
    }

    /// Build a file, inferring the language from the extension when none is given.
    pub fn with_language(
        path: impl Into<String>,
        content: impl Into<String>,
        language: Option<String>,
    ) -> Self {
        let path = path.into();
        let language = language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| infer_language(&path).to_string());
        Self {
            path,
            content: content.into(),
            language,
        }
    }

    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.path).extension().and_then(|e| e.to_str())
    }
}

/// The file list a provider must return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedPayload {
    #[schemars(length(min = 1))]
    pub files: Vec<GeneratedFile>,
}

impl GeneratedPayload {
    pub fn new(files: Vec<GeneratedFile>) -> Self {
        Self { files }
    }

    /// Fill in languages the provider left blank.
    pub fn with_inferred_languages(mut self) -> Self {
        for f in &mut self.files {
            if f.language.trim().is_empty() {
                f.language = infer_language(&f.path).to_string();
            }
        }
        self
    }
}

pub fn infer_language(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("ts") | Some("tsx") | Some("mts") => "typescript",
        Some("js") | Some("jsx") | Some("mjs") | Some("cjs") => "javascript",
        Some("css") | Some("scss") => "css",
        Some("html") | Some("htm") => "html",
        Some("json") => "json",
        Some("md") => "markdown",
        Some("py") => "python",
        Some("rs") => "rust",
        Some("go") => "go",
        Some("java") => "java",
        Some("yml") | Some("yaml") => "yaml",
        Some("sh") => "shell",
        Some("vue") => "vue",
        Some("svelte") => "svelte",
        _ => "plaintext",
    }
}
