//! Built-in engine for a subset of the Pug template language.
//!
//! Output is compact HTML: no indentation or newlines are added between
//! tags. The supported syntax covers doctypes, tags with class/id shorthand
//! and attribute lists, text (inline, piped, blocks, literal HTML),
//! buffered code, interpolation, comments, conditionals and iteration.
//! Anything else is rejected with [`CompileError::Syntax`].

mod expr;
mod lines;
mod parser;
mod render;

use pugdir_core::Options;

use crate::compiler::TemplateCompiler;
use crate::error::CompileError;

pub use render::escape_html;

/// Compiles Pug source with the merged config as template variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct PugCompiler;

impl PugCompiler {
    pub fn new() -> Self {
        PugCompiler
    }
}

impl TemplateCompiler for PugCompiler {
    fn compile(&self, source: &str, config: &Options) -> Result<String, CompileError> {
        let tree = lines::build_tree(source)?;
        let nodes = parser::parse_block(&tree)?;
        render::render(&nodes, config)
    }

    fn name(&self) -> &'static str {
        "pug"
    }
}
