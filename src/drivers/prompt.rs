//! System prompts and the provider-neutral [`Prompt`] type.

use crate::types::{GeneratedFile, EVENT_PREFIX};

/// Non-streaming generation: the model answers with one JSON object.
pub const FILES_SYSTEM_PROMPT: &str = r#"You are a senior software engineer who writes complete, working projects.
Respond with a single JSON object and nothing else:
{"files": [{"path": "relative/path.ext", "content": "full file contents", "language": "language name"}]}
Rules:
- Every file must have a non-empty path and its complete content.
- Use relative paths with forward slashes.
- Do not wrap the JSON in markdown fences and do not add commentary."#;

/// Streaming generation: the model writes the event wire format directly.
pub fn stream_system_prompt() -> String {
    format!(
        r#"You are a senior software engineer who writes complete, working projects.
Stream your answer as events, one per line, each line exactly:
{prefix}<json>
followed by a blank line. Events:
{prefix}{{"type":"status","message":"short progress note"}}
{prefix}{{"type":"file","path":"relative/path.ext","content":"full file contents","language":"language name"}}
Emit one file event per file as soon as the file is finished. Escape newlines inside JSON strings as \n.
Write nothing outside these lines."#,
        prefix = EVENT_PREFIX
    )
}

/// A provider-neutral prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// Overrides the provider's configured model.
    pub model: Option<String>,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn files(user: &str) -> Self {
        Self::new(FILES_SYSTEM_PROMPT, user)
    }

    pub fn streaming(user: &str) -> Self {
        Self::new(stream_system_prompt(), user)
    }

    /// Streaming edit prompt carrying the current file set inline.
    pub fn edit(files: &[GeneratedFile], instruction: &str) -> Self {
        let mut user = String::from("Current files:\n");
        for f in files {
            user.push_str(&format!("--- {} ---\n{}\n", f.path, f.content));
        }
        user.push_str("\nInstruction:\n");
        user.push_str(instruction);
        let system = format!(
            "{}\nYou are editing an existing project. Emit a file event with the complete new \
             content for every file you change or add, and none for files left as they are.",
            stream_system_prompt()
        );
        Self::new(system, user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_prompt_lists_files_then_instruction() {
        let files = vec![GeneratedFile::new("src/main.rs", "fn main() {}")];
        let p = Prompt::edit(&files, "add logging");
        assert!(p.user.starts_with("Current files:\n--- src/main.rs ---\nfn main() {}"));
        assert!(p.user.ends_with("Instruction:\nadd logging"));
        assert!(p.system.starts_with(&stream_system_prompt()));
    }

    #[test]
    fn stream_prompt_uses_wire_prefix() {
        assert!(stream_system_prompt().contains("data: {\"type\":\"file\""));
    }
}
