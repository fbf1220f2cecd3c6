//! # pugdir-build
//!
//! Directory-to-directory template compilation.
//!
//! Construct a [`DirectoryTemplateCompiler`] over one or more input roots and
//! call [`build`](DirectoryTemplateCompiler::build), or hand it to a [`Host`]
//! that also manages the output directory. [`diff_build`] previews changes
//! without writing.

pub mod compiler;
pub mod diff;
pub mod error;
pub mod host;
pub mod plan;
pub mod walk;
pub mod writer;

pub use compiler::{BuildReport, DirectoryTemplateCompiler};
pub use diff::{diff_build, FileDiff};
pub use error::BuildError;
pub use host::Host;
pub use plan::{plan_build, PlanEntry};
pub use writer::WriteResult;
