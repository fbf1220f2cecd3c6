//! pugdir-renderer: template engines behind the [`TemplateCompiler`] trait.
//!
//! - [`PugCompiler`]: built-in Pug-subset engine producing compact HTML.
//! - [`TeraCompiler`]: one-off Tera rendering with optional shared partials.

pub mod compiler;
pub mod error;
pub mod pug;
pub mod tera_engine;

pub use compiler::{compiler_for, TemplateCompiler};
pub use error::CompileError;
pub use pug::PugCompiler;
pub use tera_engine::TeraCompiler;
