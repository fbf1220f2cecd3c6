//! Project config file (`pugdir.yaml`).
//!
//! # Layout
//!
//! ```text
//! <project>/
//!   pugdir.yaml      (inputs, output, engine, suffixes, jobs, options, locals, partials)
//!   src/             (default input root)
//!   dist/            (default output dir)
//! ```
//!
//! Relative `inputs` / `output` entries are resolved against the directory
//! holding the config file, never the process working directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::{Engine, InputRoots, Locals, Options, Suffixes};

/// File name looked up by the CLI when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "pugdir.yaml";

/// Default input directory written by [`init_at`].
pub const DEFAULT_INPUT_DIR: &str = "src";

/// Default output directory written by [`init_at`].
pub const DEFAULT_OUTPUT_DIR: &str = "dist";

/// Root of the `pugdir.yaml` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub inputs: InputRoots,
    pub output: PathBuf,
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub suffixes: Suffixes,
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub locals: Locals,
    /// Directory of shared templates made available to the Tera engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partials: Option<PathBuf>,
}

fn default_jobs() -> usize {
    1
}

impl ProjectConfig {
    /// A config with default engine, suffixes and empty option/local bags.
    pub fn new(inputs: InputRoots, output: PathBuf) -> Self {
        ProjectConfig {
            inputs,
            output,
            engine: Engine::default(),
            suffixes: Suffixes::default(),
            jobs: default_jobs(),
            options: Options::new(),
            locals: Locals::new(),
            partials: None,
        }
    }

    /// Copy of `self` with relative `inputs` and `output` joined onto `base`.
    pub fn resolve_against(&self, base: &Path) -> ProjectConfig {
        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base.join(p)
            }
        };
        let mut resolved = self.clone();
        resolved.inputs = InputRoots::new(self.inputs.iter().map(&resolve))
            .unwrap_or_else(|_| self.inputs.clone());
        resolved.output = resolve(&self.output);
        resolved.partials = self.partials.as_ref().map(&resolve);
        resolved
    }
}

/// `<dir>/pugdir.yaml` (pure, no I/O).
pub fn config_path_at(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

/// Load a config file as written on disk (paths left unresolved).
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML, and
/// `ConfigError::InvalidArgument` for an empty template suffix.
pub fn load_at(path: &Path) -> Result<ProjectConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let config: ProjectConfig = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.suffixes.validate()?;
    Ok(config)
}

/// Load a config file and resolve its paths against the file's directory.
pub fn load_resolved_at(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let config = load_at(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.resolve_against(base))
}

/// Atomically save a config file.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `rename`.
pub fn save_at(path: &Path, config: &ProjectConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Scaffold `<dir>/pugdir.yaml`.
///
/// Idempotent: if the file already exists, loads and returns it unchanged.
/// The boolean is `true` when a new file was written.
pub fn init_at(
    dir: &Path,
    inputs: Option<InputRoots>,
    output: Option<PathBuf>,
) -> Result<(ProjectConfig, bool), ConfigError> {
    let path = config_path_at(dir);
    if path.exists() {
        return Ok((load_at(&path)?, false));
    }

    let inputs = match inputs {
        Some(inputs) => inputs,
        None => InputRoots::new([DEFAULT_INPUT_DIR])?,
    };
    let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let config = ProjectConfig::new(inputs, output);
    save_at(&path, &config)?;
    Ok((config, true))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
