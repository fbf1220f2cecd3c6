//! `pugdir init [dir] [--input <dir>]... [--output <dir>]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use pugdir_core::{config, InputRoots};

/// Scaffold a pugdir.yaml project file.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Project directory (created if missing).
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Input directory, relative to the project. Repeatable; defaults to `src`.
    #[arg(long = "input", short = 'i', value_name = "DIR")]
    pub inputs: Vec<PathBuf>,

    /// Output directory, relative to the project. Defaults to `dist`.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let inputs = if self.inputs.is_empty() {
            None
        } else {
            Some(InputRoots::new(self.inputs)?)
        };
        let (cfg, created) = config::init_at(&self.dir, inputs, self.output)
            .with_context(|| format!("failed to initialise '{}'", self.dir.display()))?;

        let path = config::config_path_at(&self.dir);
        if created {
            println!("{} Created {}", "✓".green(), path.display());
        } else {
            println!("{} {} already exists, left unchanged", "·".dimmed(), path.display());
        }
        let inputs: Vec<String> = cfg.inputs.iter().map(|p| p.display().to_string()).collect();
        println!("  inputs: {}", inputs.join(", "));
        println!("  output: {}", cfg.output.display());
        Ok(())
    }
}
