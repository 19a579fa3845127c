//! 静默审计模块：在返回前让外部工具修复生成文件中的明显错误。
//!
//! # Silent Audit Pass
//!
//! ```text
//! files ──▶ source filter ──▶ temp workspace ──▶ Sandbox::run (bounded) ──▶ read back ──▶ merge
//! ```
//!
//! The pass never fails. Without an available [`Sandbox`] the input vector is handed
//! back untouched. Tool errors and timeouts degrade to "no changes". The workspace is
//! a [`tempfile::TempDir`] and is removed on every exit path.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Auditor`] | Runs the pass with a sandbox and timeout |
//! | [`Sandbox`] | Capability trait for the repair tool |
//! | [`UnavailableSandbox`] | Default, makes the pass a no-op |
//! | [`CommandSandbox`] | Runs a configured CLI via `tokio::process` |
//! | [`FAILURE_SIGNATURES`] | Log fragments worth telling the tool about |

pub mod sandbox;
pub mod workspace;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{AuditConfig, AUDIT_TIMEOUT_SECS};
use crate::types::GeneratedFile;

pub use sandbox::{CommandSandbox, Sandbox, SandboxOutcome, UnavailableSandbox};
pub use workspace::{sanitize, Workspace};

/// Diagnostic fragments that point at a broken build, matched case-insensitively.
pub const FAILURE_SIGNATURES: &[&str] = &[
    "module not found",
    "syntax error",
    "cannot find module",
    "unexpected token",
    "is not defined",
    "failed to compile",
];

const SOURCE_EXTENSIONS: &[&str] = &[
    "js", "jsx", "mjs", "cjs", "ts", "tsx", "vue", "svelte", "html", "htm", "css", "scss", "py",
    "rs", "go", "java", "kt", "rb", "php", "c", "h", "cc", "cpp", "hpp", "cs", "swift",
];

/// What the audit knows about the request.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub prompt: String,
    /// Build or runtime log reported for the files, if any.
    pub diagnostics: String,
}

impl AuditContext {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            diagnostics: String::new(),
        }
    }

    pub fn with_diagnostics(mut self, log: impl Into<String>) -> Self {
        self.diagnostics = log.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditOutcome {
    pub files_after: Vec<GeneratedFile>,
    /// Whether any file content changed.
    pub fixed: bool,
    pub diagnostics: Vec<String>,
}

impl AuditOutcome {
    fn unchanged(files: Vec<GeneratedFile>, diagnostics: Vec<String>) -> Self {
        Self {
            files_after: files,
            fixed: false,
            diagnostics,
        }
    }

    /// Paths whose content differs from `before`.
    pub fn changed<'a>(&'a self, before: &'a [GeneratedFile]) -> impl Iterator<Item = &'a GeneratedFile> {
        self.files_after
            .iter()
            .zip(before.iter())
            .filter(|(after, before)| after.content != before.content)
            .map(|(after, _)| after)
    }
}

/// Signatures found in a diagnostic log.
pub fn matched_signatures(log: &str) -> Vec<&'static str> {
    let lower = log.to_lowercase();
    FAILURE_SIGNATURES
        .iter()
        .copied()
        .filter(|sig| lower.contains(sig))
        .collect()
}

pub fn is_source_file(path: &str) -> bool {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| SOURCE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Clone)]
pub struct Auditor {
    sandbox: Arc<dyn Sandbox>,
    timeout: Duration,
}

impl std::fmt::Debug for Auditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auditor")
            .field("available", &self.sandbox.is_available())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for Auditor {
    fn default() -> Self {
        Self::new(Arc::new(UnavailableSandbox), Duration::from_secs(AUDIT_TIMEOUT_SECS))
    }
}

impl Auditor {
    pub fn new(sandbox: Arc<dyn Sandbox>, timeout: Duration) -> Self {
        Self { sandbox, timeout }
    }

    /// Command sandbox when enabled and configured, otherwise the no-op default.
    pub fn from_config(config: &AuditConfig) -> Self {
        let sandbox: Arc<dyn Sandbox> = match (&config.command, config.enabled) {
            (Some(command), true) => Arc::new(CommandSandbox::new(command.clone())),
            _ => Arc::new(UnavailableSandbox),
        };
        Self::new(sandbox, config.timeout())
    }

    pub fn is_enabled(&self) -> bool {
        self.sandbox.is_available()
    }

    /// Audited files only.
    pub async fn silent_audit(&self, files: Vec<GeneratedFile>, context: &AuditContext) -> Vec<GeneratedFile> {
        self.audit(files, context).await.files_after
    }

    pub async fn audit(&self, files: Vec<GeneratedFile>, context: &AuditContext) -> AuditOutcome {
        if !self.sandbox.is_available() {
            return AuditOutcome::unchanged(files, Vec::new());
        }

        let signatures = matched_signatures(&context.diagnostics);
        let selected: Vec<usize> = files
            .iter()
            .enumerate()
            .filter(|(_, f)| is_source_file(&f.path))
            .map(|(i, _)| i)
            .collect();
        if selected.is_empty() {
            return AuditOutcome::unchanged(files, vec!["no source files to audit".into()]);
        }

        let workspace = match Workspace::create(&files, &selected).await {
            Ok(ws) if !ws.written().is_empty() => ws,
            Ok(_) => return AuditOutcome::unchanged(files, vec!["no auditable paths".into()]),
            Err(e) => {
                tracing::warn!(error = %e, "audit workspace could not be prepared");
                return AuditOutcome::unchanged(files, vec![e.to_string()]);
            }
        };

        let instruction = build_instruction(context, &signatures, &workspace);
        tracing::debug!(
            files = workspace.written().len(),
            signatures = signatures.len(),
            "running audit sandbox"
        );

        let run = tokio::time::timeout(
            self.timeout,
            self.sandbox.run(workspace.path(), &instruction, self.timeout),
        )
        .await;

        let outcome = match run {
            Ok(Ok(outcome)) if outcome.success => outcome,
            Ok(Ok(outcome)) => {
                tracing::warn!("audit tool reported failure, keeping generated files");
                return AuditOutcome::unchanged(files, vec![outcome.log]);
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "audit tool failed, keeping generated files");
                return AuditOutcome::unchanged(files, vec![e.to_string()]);
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "audit timed out, keeping generated files");
                return AuditOutcome::unchanged(files, vec!["audit timed out".into()]);
            }
        };

        let mut files = files;
        let mut fixed = false;
        for (index, rel) in workspace.written() {
            let Some(content) = workspace.read_back(rel).await else { continue };
            if content.trim().is_empty() {
                continue;
            }
            if let Some(file) = files.get_mut(*index) {
                if file.content != content {
                    tracing::info!(path = %file.path, "audit rewrote file");
                    file.content = content;
                    fixed = true;
                }
            }
        }

        let mut diagnostics: Vec<String> = signatures.iter().map(|s| s.to_string()).collect();
        if !outcome.log.is_empty() {
            diagnostics.push(outcome.log);
        }
        AuditOutcome {
            files_after: files,
            fixed,
            diagnostics,
        }
    }
}

fn build_instruction(context: &AuditContext, signatures: &[&str], workspace: &Workspace) -> String {
    let mut text = String::from(
        "Review the project in the current directory and fix errors that would stop it from building or running.\n\
         Edit the existing files in place. Do not create, rename or delete files. Keep behaviour unchanged otherwise.\n",
    );
    if !context.prompt.trim().is_empty() {
        text.push_str(&format!("\nThe project was generated for this request:\n{}\n", context.prompt.trim()));
    }
    if !signatures.is_empty() {
        text.push_str(&format!("\nReported problems: {}\n", signatures.join(", ")));
    }
    text.push_str("\nFiles:\n");
    for (_, rel) in workspace.written() {
        text.push_str(&format!("- {}\n", rel.display()));
    }
    text
}
