//! The [`TemplateCompiler`] seam between the directory walker and an engine.

use std::path::Path;
use std::sync::Arc;

use pugdir_core::{Engine, Options};

use crate::error::CompileError;
use crate::pug::PugCompiler;
use crate::tera_engine::TeraCompiler;

/// Turns one template source plus its merged config into output text.
///
/// Implementations must be shareable across worker tasks.
pub trait TemplateCompiler: Send + Sync {
    fn compile(&self, source: &str, config: &Options) -> Result<String, CompileError>;

    /// Short engine name used in logs.
    fn name(&self) -> &'static str {
        "custom"
    }
}

impl<F> TemplateCompiler for F
where
    F: Fn(&str, &Options) -> Result<String, CompileError> + Send + Sync,
{
    fn compile(&self, source: &str, config: &Options) -> Result<String, CompileError> {
        self(source, config)
    }
}

/// Built-in engine for `engine`. `partials` is only read by Tera, which
/// registers every `.tera` file under it for `{% include %}` / `{% extends %}`.
pub fn compiler_for(
    engine: Engine,
    partials: Option<&Path>,
) -> Result<Arc<dyn TemplateCompiler>, CompileError> {
    Ok(match engine {
        Engine::Pug => Arc::new(PugCompiler::new()),
        Engine::Tera => Arc::new(TeraCompiler::new(partials)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_compilers() {
        let upper = |source: &str, _: &Options| -> Result<String, CompileError> {
            Ok(source.to_uppercase())
        };
        assert_eq!(upper.compile("abc", &Options::new()).unwrap(), "ABC");
        assert_eq!(upper.name(), "custom");
    }

    #[test]
    fn compiler_for_selects_engine() {
        assert_eq!(compiler_for(Engine::Pug, None).unwrap().name(), "pug");
        assert_eq!(compiler_for(Engine::Tera, None).unwrap().name(), "tera");
    }
}
