//! Recursive, deterministic enumeration of the files under an input root.

use std::path::{Path, PathBuf};

use crate::error::{io_err, BuildError};

/// Every regular file under `root`, as paths relative to `root`, sorted.
///
/// Symlinks to files are included; symlinked directories are not followed.
pub async fn walk_files(root: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| io_err(&dir, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(&dir, e))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| io_err(&path, e))?;
            let is_file = if file_type.is_symlink() {
                tokio::fs::metadata(&path)
                    .await
                    .map(|meta| meta.is_file())
                    .unwrap_or(false)
            } else {
                file_type.is_file()
            };

            if file_type.is_dir() {
                pending.push(path);
            } else if is_file {
                let rel = path.strip_prefix(root).unwrap_or(path.as_path());
                files.push(rel.to_path_buf());
            }
        }
    }

    files.sort();
    Ok(files)
}
