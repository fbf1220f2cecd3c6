//! Error types for pugdir-build.

use std::path::PathBuf;

use thiserror::Error;

use pugdir_core::ConfigError;
use pugdir_renderer::CompileError;

/// All errors that can arise from a directory build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Bad construction arguments or host setup.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A template was rejected by the engine. `path` is relative to its root.
    #[error("failed to compile {path}: {source}")]
    Compile {
        path: PathBuf,
        #[source]
        source: CompileError,
    },

    /// Two sources in different roots map onto the same output file.
    #[error("output {output} is produced by both {first} and {second}")]
    OutputCollision {
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    /// A parallel worker panicked or could not be joined.
    #[error("build task failure: {0}")]
    Task(String),
}

impl From<ConfigError> for BuildError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidArgument(msg) => BuildError::InvalidArgument(msg),
            ConfigError::Io { path, source } => BuildError::Io { path, source },
            other => BuildError::InvalidArgument(other.to_string()),
        }
    }
}

/// Convenience constructor for [`BuildError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> BuildError {
    BuildError::Io {
        path: path.into(),
        source,
    }
}
