//! Dry-run unified diff support for `pugdir diff`.

use std::path::{Path, PathBuf};

use similar::TextDiff;

use crate::compiler::{compile_entry, DirectoryTemplateCompiler};
use crate::writer::read_existing;
use crate::BuildError;

/// A single compiled output that differs from what is on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Output path relative to the output directory.
    pub path: PathBuf,
    pub unified_diff: String,
}

/// Compile every template and compare it with the current output tree.
///
/// No files are written. Outputs that would be identical are omitted.
pub async fn diff_build(
    compiler: &DirectoryTemplateCompiler,
    output: &Path,
) -> Result<Vec<FileDiff>, BuildError> {
    let plan = compiler.plan().await?;
    let config = compiler.merged_config();

    let mut diffs = Vec::new();
    for entry in &plan {
        let compiled = compile_entry(entry, compiler.compiler().as_ref(), &config).await?;
        let target = output.join(&entry.output);
        let existing = read_existing(&target).await?;
        if existing.as_deref() == Some(compiled.as_bytes()) {
            continue;
        }
        let existing = existing
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();

        let old_header = format!("a/{}", entry.output.display());
        let new_header = format!("b/{}", entry.output.display());
        let unified = TextDiff::from_lines(&existing, &compiled)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string();

        diffs.push(FileDiff {
            path: entry.output.clone(),
            unified_diff: unified,
        });
    }
    Ok(diffs)
}
