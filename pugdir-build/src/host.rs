//! Owner of the output directory for a build.

use std::path::{Path, PathBuf};

use crate::compiler::{BuildReport, DirectoryTemplateCompiler};
use crate::error::{io_err, BuildError};
use crate::writer::ensure_dir;

/// Runs a [`DirectoryTemplateCompiler`] into an output directory it manages.
///
/// Unless `persistentOutput` was set, the output directory is emptied before
/// every build so removed templates do not leave stale documents behind.
#[derive(Debug, Clone)]
pub struct Host {
    compiler: DirectoryTemplateCompiler,
    output: PathBuf,
}

impl Host {
    pub fn new(compiler: DirectoryTemplateCompiler, output: impl Into<PathBuf>) -> Self {
        Host {
            compiler,
            output: output.into(),
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn compiler(&self) -> &DirectoryTemplateCompiler {
        &self.compiler
    }

    pub async fn build(&self) -> Result<BuildReport, BuildError> {
        self.check_overlap()?;

        let host = self.compiler.host_options();
        tracing::info!(
            annotation = host.annotation.as_deref().unwrap_or("-"),
            output = %self.output.display(),
            persistent = host.persistent_output,
            "host build",
        );

        if !self.compiler.is_dry_run() {
            if !host.persistent_output {
                clear_dir(&self.output).await?;
            }
            ensure_dir(&self.output).await?;
        }
        self.compiler.build(&self.output).await
    }

    /// The output must be disjoint from every input root.
    fn check_overlap(&self) -> Result<(), BuildError> {
        let output = absolute(&self.output)?;
        for root in self.compiler.input_roots() {
            let root_abs = absolute(root)?;
            if output.starts_with(&root_abs) || root_abs.starts_with(&output) {
                return Err(BuildError::InvalidArgument(format!(
                    "output directory {} overlaps input root {}",
                    self.output.display(),
                    root.display()
                )));
            }
        }
        Ok(())
    }
}

fn absolute(path: &Path) -> Result<PathBuf, BuildError> {
    std::path::absolute(path).map_err(|e| io_err(path, e))
}

/// Remove everything inside `dir`, keeping `dir` itself. Missing is fine.
async fn clear_dir(dir: &Path) -> Result<(), BuildError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(io_err(dir, e)),
    };
    while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(dir, e))? {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|e| io_err(&path, e))?;
        let removed = if file_type.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        removed.map_err(|e| io_err(&path, e))?;
    }
    tracing::debug!(dir = %dir.display(), "cleared output directory");
    Ok(())
}
