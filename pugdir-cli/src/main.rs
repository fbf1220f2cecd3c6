//! pugdir: compile a directory of templates into a mirrored HTML tree.
//!
//! # Usage
//!
//! ```text
//! pugdir init [dir] [--input <dir>]... [--output <dir>]
//! pugdir build [inputs]... [-o <dir>] [-c <file>] [--local k=v]... [--option k=v]...
//!              [--engine pug|tera] [--jobs N] [--dry-run] [--persistent-output]
//!              [--annotation <label>]
//! pugdir plan [inputs]... [-c <file>]
//! pugdir diff [inputs]... [-o <dir>] [-c <file>]
//! ```

mod commands;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};

use commands::{build::BuildArgs, diff::DiffArgs, init::InitArgs, plan::PlanArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "pugdir",
    version,
    about = "Compile a directory tree of Pug templates into HTML",
    long_about = None,
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scaffold a pugdir.yaml project file.
    Init(InitArgs),

    /// Compile every template into the output directory.
    Build(BuildArgs),

    /// List the templates a build would compile and where they land.
    Plan(PlanArgs),

    /// Show unified diffs between a fresh build and the current output.
    Diff(DiffArgs),
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Build(args) => runtime.block_on(args.run()),
        Commands::Plan(args) => runtime.block_on(args.run()),
        Commands::Diff(args) => runtime.block_on(args.run()),
    }
}
