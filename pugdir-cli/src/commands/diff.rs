//! `pugdir diff`: show unified diffs for what a build would write.

use anyhow::{Context, Result};
use clap::Args;

use pugdir_build::diff_build;

use super::{make_compiler, ProjectArgs};

/// Arguments for `pugdir diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

impl DiffArgs {
    pub async fn run(self) -> Result<()> {
        let cfg = self.project.resolve()?;
        let output = cfg.output.clone();
        let compiler = make_compiler(cfg)?;

        let diffs = diff_build(&compiler, &output)
            .await
            .with_context(|| format!("diff against '{}' failed", output.display()))?;

        if diffs.is_empty() {
            println!("No differences in '{}'.", output.display());
            return Ok(());
        }

        for diff in diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }
        Ok(())
    }
}
