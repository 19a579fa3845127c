//! Sandbox capability: the external tool that repairs files in a workspace.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::AuditCommand;
use crate::{Error, ErrorContext, Result};

/// Longest tool log kept in diagnostics.
const MAX_LOG: usize = 4096;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxOutcome {
    pub success: bool,
    pub log: String,
}

#[async_trait]
pub trait Sandbox: Send + Sync {
    fn is_available(&self) -> bool;

    /// Run the repair tool inside `workspace`, editing files in place.
    async fn run(&self, workspace: &Path, instruction: &str, timeout: Duration) -> Result<SandboxOutcome>;
}

/// Default sandbox: never available, so the audit pass is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableSandbox;

#[async_trait]
impl Sandbox for UnavailableSandbox {
    fn is_available(&self) -> bool {
        false
    }

    async fn run(&self, _workspace: &Path, _instruction: &str, _timeout: Duration) -> Result<SandboxOutcome> {
        Err(Error::runtime_with_context(
            "no audit sandbox configured",
            ErrorContext::new().with_source("audit"),
        ))
    }
}

/// Runs a configured CLI in the workspace with the instruction as its last argument.
#[derive(Debug, Clone)]
pub struct CommandSandbox {
    command: AuditCommand,
}

impl CommandSandbox {
    pub fn new(command: AuditCommand) -> Self {
        Self { command }
    }

    fn resolve(&self) -> Option<PathBuf> {
        let program = Path::new(&self.command.program);
        if program.components().count() > 1 {
            return program.is_file().then(|| program.to_path_buf());
        }
        let paths = std::env::var_os("PATH")?;
        std::env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
    }
}

#[async_trait]
impl Sandbox for CommandSandbox {
    fn is_available(&self) -> bool {
        self.resolve().is_some()
    }

    async fn run(&self, workspace: &Path, instruction: &str, timeout: Duration) -> Result<SandboxOutcome> {
        let child = tokio::process::Command::new(&self.command.program)
            .args(&self.command.args)
            .arg(instruction)
            .current_dir(workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // On timeout the child is dropped with the future and killed.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::runtime_with_context(
                    format!("audit tool timed out after {}s", timeout.as_secs()),
                    ErrorContext::new()
                        .with_source("audit")
                        .with_details(self.command.program.clone()),
                )
            })??;

        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&output.stderr));
        let log: String = log.chars().take(MAX_LOG).collect();

        Ok(SandboxOutcome {
            success: output.status.success(),
            log,
        })
    }
}
