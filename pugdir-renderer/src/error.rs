//! Error types for pugdir-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors a template engine can report for one source.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The template could not be parsed.
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// The template parsed but could not be rendered with the given values.
    #[error("line {line}: {message}")]
    Render { line: usize, message: String },

    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// Filesystem error while loading shared templates.
    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

impl CompileError {
    /// Source line the error points at, when the engine knows it.
    pub fn line(&self) -> Option<usize> {
        match self {
            CompileError::Syntax { line, .. } | CompileError::Render { line, .. } => Some(*line),
            _ => None,
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CompileError {
    CompileError::Io {
        path: path.into(),
        source,
    }
}
