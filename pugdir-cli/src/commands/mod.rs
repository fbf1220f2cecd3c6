pub mod build;
pub mod diff;
pub mod init;
pub mod plan;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use pugdir_build::DirectoryTemplateCompiler;
use pugdir_core::{
    config::{self, ProjectConfig, CONFIG_FILE_NAME, DEFAULT_OUTPUT_DIR},
    Engine, InputRoots, Suffixes,
};
use pugdir_renderer::compiler_for;

// ---------------------------------------------------------------------------
// KEY=VALUE flags
// ---------------------------------------------------------------------------

/// `--local` / `--option` value. The right-hand side is parsed as JSON and
/// falls back to a plain string.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub key: String,
    pub value: Value,
}

impl FromStr for KeyValue {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (key, raw) = s
            .split_once('=')
            .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("missing key in '{s}'"));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        Ok(KeyValue {
            key: key.to_string(),
            value,
        })
    }
}

// ---------------------------------------------------------------------------
// Shared project arguments
// ---------------------------------------------------------------------------

/// Where the inputs, output and template values come from.
///
/// Precedence: flags > `--config` file > `./pugdir.yaml` > defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Input directories. Overrides `inputs` from the config file.
    pub inputs: Vec<PathBuf>,

    /// Output directory.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Project file (defaults to ./pugdir.yaml when present).
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Template variable, e.g. `--local pageTitle=Home` or `--local 'nav=["a","b"]'`.
    #[arg(long = "local", value_name = "KEY=VALUE")]
    pub locals: Vec<KeyValue>,

    /// Engine option passed through with the template values.
    #[arg(long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<KeyValue>,

    /// Template engine: pug | tera.
    #[arg(long)]
    pub engine: Option<Engine>,

    /// Directory of shared `.tera` templates (tera engine only).
    #[arg(long)]
    pub partials: Option<PathBuf>,

    /// Template file suffix.
    #[arg(long, value_name = "SUFFIX")]
    pub template_suffix: Option<String>,

    /// Output file suffix.
    #[arg(long, value_name = "SUFFIX")]
    pub output_suffix: Option<String>,

    /// Number of files compiled at once.
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,
}

impl ProjectArgs {
    /// Merge flags over the project file into one resolved config.
    pub fn resolve(&self) -> Result<ProjectConfig> {
        let mut cfg = match self.config_file() {
            Some(path) => config::load_resolved_at(&path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => {
                let inputs = InputRoots::new(self.inputs.iter().cloned())
                    .context("no input directories given and no pugdir.yaml found")?;
                ProjectConfig::new(inputs, PathBuf::from(DEFAULT_OUTPUT_DIR))
            }
        };

        if !self.inputs.is_empty() {
            cfg.inputs = InputRoots::new(self.inputs.iter().cloned())?;
        }
        if let Some(output) = &self.output {
            cfg.output = output.clone();
        }
        if let Some(engine) = self.engine {
            cfg.engine = engine;
        }
        if let Some(partials) = &self.partials {
            cfg.partials = Some(partials.clone());
        }
        if let Some(jobs) = self.jobs {
            cfg.jobs = jobs;
        }
        if self.template_suffix.is_some() || self.output_suffix.is_some() {
            cfg.suffixes = Suffixes::new(
                self.template_suffix.clone().unwrap_or(cfg.suffixes.template),
                self.output_suffix.clone().unwrap_or(cfg.suffixes.output),
            );
            cfg.suffixes.validate()?;
        }
        for kv in &self.options {
            cfg.options.insert(kv.key.clone(), kv.value.clone());
        }
        for kv in &self.locals {
            cfg.locals.insert(kv.key.clone(), kv.value.clone());
        }
        tracing::debug!(
            inputs = cfg.inputs.len(),
            output = %cfg.output.display(),
            engine = %cfg.engine,
            jobs = cfg.jobs,
            "resolved project"
        );
        Ok(cfg)
    }

    fn config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config {
            return Some(path.clone());
        }
        let default = Path::new(CONFIG_FILE_NAME);
        default.exists().then(|| default.to_path_buf())
    }
}

/// Build the directory compiler described by `cfg`.
pub fn make_compiler(cfg: ProjectConfig) -> Result<DirectoryTemplateCompiler> {
    let engine = compiler_for(cfg.engine, cfg.partials.as_deref())
        .with_context(|| format!("failed to set up the {} engine", cfg.engine))?;
    let compiler = DirectoryTemplateCompiler::new(cfg.inputs.as_slice(), cfg.options, cfg.locals)?
        .with_compiler(engine)
        .with_suffixes(cfg.suffixes)
        .with_concurrency(cfg.jobs);
    Ok(compiler)
}
