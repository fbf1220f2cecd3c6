//! Tera engine: renders each source as a one-off template.

use std::path::{Path, PathBuf};

use tera::{Context, Tera};

use pugdir_core::Options;

use crate::compiler::TemplateCompiler;
use crate::error::{io_err, CompileError};

const PARTIAL_EXTENSION: &str = "tera";

// ---------------------------------------------------------------------------
// Partials loading
// ---------------------------------------------------------------------------

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), CompileError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn load_partials(dir: &Path) -> Result<Vec<(String, String)>, CompileError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    files.sort();

    let mut templates = Vec::new();
    for path in files {
        if path.extension().and_then(|s| s.to_str()) != Some(PARTIAL_EXTENSION) {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

// ---------------------------------------------------------------------------
// TeraCompiler
// ---------------------------------------------------------------------------

/// Renders sources with Tera, HTML autoescaping on.
///
/// The base [`Tera`] instance holds only the partials; each compile clones
/// it so sources never leak into one another.
#[derive(Debug, Clone)]
pub struct TeraCompiler {
    base: Tera,
}

impl TeraCompiler {
    pub fn new(partials: Option<&Path>) -> Result<Self, CompileError> {
        let mut base = Tera::default();
        if let Some(dir) = partials {
            base.add_raw_templates(load_partials(dir)?)?;
        }
        Ok(TeraCompiler { base })
    }

    /// Names of the registered partials, sorted.
    pub fn partial_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.base.get_template_names().collect();
        names.sort_unstable();
        names
    }
}

impl TemplateCompiler for TeraCompiler {
    fn compile(&self, source: &str, config: &Options) -> Result<String, CompileError> {
        let context = Context::from_serialize(config)?;
        let mut tera = self.base.clone();
        tera.autoescape_on(vec![""]);
        Ok(tera.render_str(source, &context)?)
    }

    fn name(&self) -> &'static str {
        "tera"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn config(value: serde_json::Value) -> Options {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Options::new(),
        }
    }

    #[test]
    fn renders_with_autoescape() {
        let compiler = TeraCompiler::new(None).unwrap();
        let out = compiler
            .compile("<h1>{{ title }}</h1>", &config(json!({"title": "a & b"})))
            .unwrap();
        assert_eq!(out, "<h1>a &amp; b</h1>");
    }

    #[test]
    fn partials_are_includable() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("layout")).unwrap();
        std::fs::write(dir.path().join("layout/nav.tera"), "<nav>{{ site }}</nav>").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let compiler = TeraCompiler::new(Some(dir.path())).unwrap();
        assert_eq!(compiler.partial_names(), vec!["layout/nav.tera"]);
        let out = compiler
            .compile(r#"{% include "layout/nav.tera" %}"#, &config(json!({"site": "x"})))
            .unwrap();
        assert_eq!(out, "<nav>x</nav>");
    }

    #[test]
    fn missing_partials_dir_is_empty() {
        let dir = TempDir::new().expect("tempdir");
        let compiler = TeraCompiler::new(Some(&dir.path().join("nope"))).unwrap();
        assert!(compiler.partial_names().is_empty());
    }

    #[test]
    fn syntax_errors_surface_as_tera_errors() {
        let compiler = TeraCompiler::new(None).unwrap();
        let err = compiler.compile("{% if %}", &Options::new()).unwrap_err();
        assert!(matches!(err, CompileError::Tera(_)));
    }
}
