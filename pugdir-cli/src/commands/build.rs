//! `pugdir build`: compile every template into the output directory.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;

use pugdir_build::{BuildReport, Host, WriteResult};
use pugdir_core::types::{ANNOTATION_KEY, PERSISTENT_OUTPUT_KEY};

use super::{make_compiler, ProjectArgs};

/// Arguments for `pugdir build`.
#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Compile everything but write nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Keep files already in the output directory.
    #[arg(long)]
    pub persistent_output: bool,

    /// Label attached to this build in logs.
    #[arg(long)]
    pub annotation: Option<String>,
}

impl BuildArgs {
    pub async fn run(self) -> Result<()> {
        let mut cfg = self.project.resolve()?;
        if self.persistent_output {
            cfg.options
                .insert(PERSISTENT_OUTPUT_KEY.to_string(), Value::Bool(true));
        }
        if let Some(label) = self.annotation {
            cfg.options.insert(ANNOTATION_KEY.to_string(), Value::String(label));
        }

        let output = cfg.output.clone();
        let compiler = make_compiler(cfg)?.dry_run(self.dry_run);
        let report = Host::new(compiler, &output)
            .build()
            .await
            .with_context(|| format!("build into '{}' failed", output.display()))?;

        print_report(&report, self.dry_run);
        Ok(())
    }
}

fn print_report(report: &BuildReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    if report.writes.is_empty() {
        println!("{prefix}{} nothing to compile", "✓".green());
        return;
    }

    let changed = report.written() + report.would_write();
    println!(
        "{prefix}{} built {} templates ({} written, {} unchanged) in {} ms",
        "✓".green(),
        report.writes.len(),
        changed,
        report.unchanged(),
        report.duration.as_millis()
    );

    for r in &report.writes {
        match r {
            WriteResult::Written { path } => println!("  {}  {}", "✎".green(), path.display()),
            WriteResult::WouldWrite { path } => println!("  {}  {}", "~".yellow(), path.display()),
            WriteResult::Unchanged { path } => println!("  {}  {}", "·".dimmed(), path.display()),
        }
    }
}
