//! `pugdir plan`: list templates and their output paths without compiling.

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use super::{make_compiler, ProjectArgs};

/// Arguments for `pugdir plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "root")]
    root: String,
    #[tabled(rename = "template")]
    source: String,
    #[tabled(rename = "output")]
    output: String,
}

impl PlanArgs {
    pub async fn run(self) -> Result<()> {
        let cfg = self.project.resolve()?;
        let output = cfg.output.clone();
        let compiler = make_compiler(cfg)?;
        let plan = compiler.plan().await.context("failed to plan build")?;

        if plan.is_empty() {
            println!("No templates found.");
            return Ok(());
        }

        let rows: Vec<PlanRow> = plan
            .iter()
            .map(|entry| PlanRow {
                root: entry.root.display().to_string(),
                source: entry.source.display().to_string(),
                output: output.join(&entry.output).display().to_string(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("{} templates", plan.len());
        Ok(())
    }
}
