//! Ephemeral on-disk copy of a file set for the audit tool.

use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use tokio::fs;
use uuid::Uuid;

use crate::types::GeneratedFile;
use crate::{Error, ErrorContext, Result};

/// A uniquely named temporary directory removed when dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    /// `(index into the original list, relative path)` of every written file.
    written: Vec<(usize, PathBuf)>,
}

impl Workspace {
    /// Write the selected files; unsafe paths are skipped.
    pub async fn create(files: &[GeneratedFile], selected: &[usize]) -> Result<Self> {
        let prefix = format!("codegen-audit-{}-", Uuid::new_v4());
        let dir = tokio::task::spawn_blocking(move || tempfile::Builder::new().prefix(&prefix).tempdir())
            .await
            .map_err(|e| {
                Error::runtime_with_context(
                    format!("workspace setup task failed: {}", e),
                    ErrorContext::new().with_source("audit"),
                )
            })??;

        let mut written = Vec::with_capacity(selected.len());
        for &i in selected {
            let Some(file) = files.get(i) else { continue };
            let Some(rel) = sanitize(&file.path) else {
                tracing::debug!(path = %file.path, "skipping path outside audit workspace");
                continue;
            };
            let full = dir.path().join(&rel);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&full, &file.content).await?;
            written.push((i, rel));
        }
        Ok(Self { dir, written })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn written(&self) -> &[(usize, PathBuf)] {
        &self.written
    }

    /// Current contents of a written file, `None` when it was deleted or became unreadable.
    pub async fn read_back(&self, rel: &Path) -> Option<String> {
        fs::read_to_string(self.dir.path().join(rel)).await.ok()
    }
}

/// Relative form of `path`, or `None` when it is absolute or climbs out of the root.
pub fn sanitize(path: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(path.trim()).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}
