//! Atomic output writer.
//!
//! ## `write_output` protocol
//!
//! 1. Compare with the bytes already on disk; skip if identical.
//! 2. In dry-run mode, stop and report what would be written.
//! 3. Ensure the parent directory exists.
//! 4. Write to `<path>.pugdir.tmp` and rename it onto the final path in one
//!    blocking job. The job runs to completion even when the awaiting task is
//!    aborted, and removes the temporary file unless the rename succeeded.
//!
//! Content is written byte for byte as the engine produced it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{io_err, BuildError};

/// Suffix appended to an output path for its in-flight temporary file.
pub const TMP_SUFFIX: &str = ".pugdir.tmp";

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File was skipped: the output on disk already matches.
    Unchanged { path: PathBuf },
    /// Dry-run mode: the file *would* have been written.
    WouldWrite { path: PathBuf },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path }
            | WriteResult::Unchanged { path }
            | WriteResult::WouldWrite { path } => path,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create `dir` and any missing parents. Succeeds if it already exists, even
/// when another task creates it concurrently.
pub async fn ensure_dir(dir: &Path) -> Result<(), BuildError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| io_err(dir, e))
}

/// Current contents of `path`, or `None` if it does not exist.
pub(crate) async fn read_existing(path: &Path) -> Result<Option<Vec<u8>>, BuildError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

// ---------------------------------------------------------------------------
// write_output
// ---------------------------------------------------------------------------

/// Temporary sibling used while `path` is being written.
pub(crate) fn tmp_path_for(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}{TMP_SUFFIX}", path.display()))
}

/// Atomically write one compiled document to `path`.
pub async fn write_output(
    path: &Path,
    content: &str,
    dry_run: bool,
) -> Result<WriteResult, BuildError> {
    write_output_holding(path, content, dry_run, ()).await
}

/// [`write_output`], keeping `guard` alive until the blocking write job has
/// finished, even if this future is dropped first.
pub(crate) async fn write_output_holding<G: Send + 'static>(
    path: &Path,
    content: &str,
    dry_run: bool,
    guard: G,
) -> Result<WriteResult, BuildError> {
    let existing = read_existing(path).await?;
    if existing.as_deref() == Some(content.as_bytes()) {
        tracing::debug!(path = %path.display(), "unchanged");
        return Ok(WriteResult::Unchanged {
            path: path.to_path_buf(),
        });
    }

    if dry_run {
        tracing::info!(path = %path.display(), "[dry-run] would write");
        return Ok(WriteResult::WouldWrite {
            path: path.to_path_buf(),
        });
    }

    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }

    let job_path = path.to_path_buf();
    let job_tmp = tmp_path_for(path);
    let bytes = content.as_bytes().to_vec();
    tokio::task::spawn_blocking(move || {
        let _guard = guard;
        commit(&job_tmp, &job_path, &bytes)
    })
    .await
    .map_err(|e| BuildError::Task(format!("write job for {} failed: {e}", path.display())))??;

    tracing::info!(path = %path.display(), "wrote");
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

/// Write `bytes` to `tmp`, then rename it onto `path`. `tmp` never outlives
/// a failure.
fn commit(tmp: &Path, path: &Path, bytes: &[u8]) -> Result<(), BuildError> {
    if let Err(e) = std::fs::write(tmp, bytes) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(tmp, e));
    }
    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
