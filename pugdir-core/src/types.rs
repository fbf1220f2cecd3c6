//! Domain types shared by every pugdir crate.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! Option and local bags are plain `serde_json` maps so any engine can consume them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Suffix constants
// ---------------------------------------------------------------------------

/// File-name suffix that marks a template source.
pub const TEMPLATE_SUFFIX: &str = ".pug";

/// Suffix that replaces [`TEMPLATE_SUFFIX`] on the compiled output.
pub const OUTPUT_SUFFIX: &str = ".html";

/// Option key carrying the host's build label.
pub const ANNOTATION_KEY: &str = "annotation";

/// Option key telling the host whether to keep the output dir between builds.
pub const PERSISTENT_OUTPUT_KEY: &str = "persistentOutput";

/// Keys consumed by the host rather than the template engine.
pub const RESERVED_OPTION_KEYS: &[&str] = &[ANNOTATION_KEY, PERSISTENT_OUTPUT_KEY];

// ---------------------------------------------------------------------------
// Option / local bags
// ---------------------------------------------------------------------------

/// Engine configuration, passed verbatim to the template compiler.
pub type Options = Map<String, Value>;

/// Variables visible inside templates.
pub type Locals = Map<String, Value>;

/// Host-only settings pulled out of [`Options`] at construction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostOptions {
    /// Free-form label the host attaches to build logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    /// Keep existing output files between builds.
    #[serde(default)]
    pub persistent_output: bool,
}

impl HostOptions {
    /// Remove the reserved keys from `options` and return them as [`HostOptions`].
    ///
    /// A non-string `annotation` is rendered with its JSON text; a non-boolean
    /// `persistentOutput` follows truthiness (`null`, `0`, `""` are false).
    pub fn strip_from(options: &mut Options) -> Self {
        let annotation = options.remove(ANNOTATION_KEY).and_then(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });
        let persistent_output = options
            .remove(PERSISTENT_OUTPUT_KEY)
            .map(|v| match v {
                Value::Bool(b) => b,
                Value::Null => false,
                Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                Value::String(s) => !s.is_empty(),
                Value::Array(_) | Value::Object(_) => true,
            })
            .unwrap_or(false);
        HostOptions {
            annotation,
            persistent_output,
        }
    }
}

/// Merge `locals` over `options` into a fresh map; locals win on key clash.
pub fn merge_config(options: &Options, locals: &Locals) -> Options {
    let mut merged = options.clone();
    for (key, value) in locals {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

// ---------------------------------------------------------------------------
// Suffixes
// ---------------------------------------------------------------------------

/// Template / output suffix pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Suffixes {
    pub template: String,
    pub output: String,
}

impl Default for Suffixes {
    fn default() -> Self {
        Suffixes {
            template: TEMPLATE_SUFFIX.to_string(),
            output: OUTPUT_SUFFIX.to_string(),
        }
    }
}

impl Suffixes {
    pub fn new(template: impl Into<String>, output: impl Into<String>) -> Self {
        Suffixes {
            template: template.into(),
            output: output.into(),
        }
    }

    /// An empty template suffix would turn every file into a template.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.template.is_empty() {
            return Err(ConfigError::InvalidArgument(
                "template suffix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// True when the final path component ends with the template suffix.
    pub fn is_template(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(&self.template))
    }

    /// Swap the trailing template suffix of `relative` for the output suffix.
    ///
    /// Only the last component is touched, so `a.pug/b.pug` maps to
    /// `a.pug/b.html`. Returns `None` for non-template paths.
    pub fn output_path(&self, relative: &Path) -> Option<PathBuf> {
        if !self.is_template(relative) {
            return None;
        }
        let name = relative.file_name()?.to_str()?;
        let stem = &name[..name.len() - self.template.len()];
        Some(relative.with_file_name(format!("{stem}{}", self.output)))
    }
}

// ---------------------------------------------------------------------------
// Input roots
// ---------------------------------------------------------------------------

/// Ordered, non-empty list of input directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PathBuf>", into = "Vec<PathBuf>")]
pub struct InputRoots(Vec<PathBuf>);

impl InputRoots {
    /// Build from any sequence of paths; fails on an empty sequence.
    pub fn new<I, P>(paths: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let roots: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        if roots.is_empty() {
            return Err(ConfigError::InvalidArgument(
                "at least one input path is required".to_string(),
            ));
        }
        Ok(InputRoots(roots))
    }

    /// The first root. Always present.
    pub fn primary(&self) -> &Path {
        &self.0[0]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.0
    }
}

impl TryFrom<Vec<PathBuf>> for InputRoots {
    type Error = ConfigError;

    fn try_from(paths: Vec<PathBuf>) -> Result<Self, Self::Error> {
        InputRoots::new(paths)
    }
}

impl From<InputRoots> for Vec<PathBuf> {
    fn from(roots: InputRoots) -> Self {
        roots.0
    }
}

impl<'a> IntoIterator for &'a InputRoots {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Anything accepted where the caller may pass "one path or many".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPaths {
    One(PathBuf),
    Many(Vec<PathBuf>),
}

impl InputPaths {
    pub fn into_roots(self) -> Result<InputRoots, ConfigError> {
        match self {
            InputPaths::One(path) => InputRoots::new([path]),
            InputPaths::Many(paths) => InputRoots::new(paths),
        }
    }
}

impl From<PathBuf> for InputPaths {
    fn from(p: PathBuf) -> Self {
        InputPaths::One(p)
    }
}

impl From<&Path> for InputPaths {
    fn from(p: &Path) -> Self {
        InputPaths::One(p.to_path_buf())
    }
}

impl From<&str> for InputPaths {
    fn from(p: &str) -> Self {
        InputPaths::One(PathBuf::from(p))
    }
}

impl From<Vec<PathBuf>> for InputPaths {
    fn from(p: Vec<PathBuf>) -> Self {
        InputPaths::Many(p)
    }
}

impl From<&[PathBuf]> for InputPaths {
    fn from(p: &[PathBuf]) -> Self {
        InputPaths::Many(p.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Built-in template engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Pug,
    Tera,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Pug => write!(f, "pug"),
            Engine::Tera => write!(f, "tera"),
        }
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pug" => Ok(Engine::Pug),
            "tera" => Ok(Engine::Tera),
            other => Err(format!("unknown engine '{other}'; expected: pug, tera")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn strip_removes_reserved_keys() {
        let mut options = map(json!({
            "persistentOutput": true,
            "annotation": "pages",
            "pretty": false
        }));
        let host = HostOptions::strip_from(&mut options);
        assert!(host.persistent_output);
        assert_eq!(host.annotation.as_deref(), Some("pages"));
        assert!(options.get("persistentOutput").is_none());
        assert!(options.get("annotation").is_none());
        assert_eq!(options.get("pretty"), Some(&json!(false)));
    }

    #[test]
    fn strip_defaults_when_absent() {
        let mut options = Options::new();
        let host = HostOptions::strip_from(&mut options);
        assert_eq!(host, HostOptions::default());
    }

    #[test]
    fn merge_prefers_locals_and_leaves_inputs_untouched() {
        let options = map(json!({"doctype": "html", "title": "from options"}));
        let locals = map(json!({"title": "from locals", "persistentOutput": 1}));
        let merged = merge_config(&options, &locals);
        assert_eq!(merged["title"], json!("from locals"));
        assert_eq!(merged["doctype"], json!("html"));
        assert_eq!(merged["persistentOutput"], json!(1), "locals are never stripped");
        assert_eq!(options["title"], json!("from options"));
    }

    #[test]
    fn empty_template_suffix_is_rejected() {
        assert!(Suffixes::default().validate().is_ok());
        assert!(Suffixes::new(".jade", "").validate().is_ok());
        let err = Suffixes::new("", ".html").validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidArgument(_)), "{err}");
    }

    #[test]
    fn output_path_swaps_only_trailing_suffix() {
        let s = Suffixes::default();
        assert_eq!(
            s.output_path(Path::new("level-1/level-2/a.pug")),
            Some(PathBuf::from("level-1/level-2/a.html"))
        );
        assert_eq!(
            s.output_path(Path::new("x.pug/index.pug")),
            Some(PathBuf::from("x.pug/index.html"))
        );
        assert_eq!(
            s.output_path(Path::new("a.pug.pug")),
            Some(PathBuf::from("a.pug.html"))
        );
        assert_eq!(s.output_path(Path::new("basic-not-compile.js")), None);
        assert_eq!(s.output_path(Path::new("notes.pug.txt")), None);
    }

    #[test]
    fn input_roots_reject_empty() {
        let err = InputRoots::new(Vec::<PathBuf>::new()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidArgument(_)));
    }

    #[test]
    fn single_and_many_paths_are_equivalent() {
        let one = InputPaths::from("fixtures").into_roots().unwrap();
        let many = InputPaths::from(vec![PathBuf::from("fixtures")])
            .into_roots()
            .unwrap();
        assert_eq!(one, many);
        assert_eq!(one.primary(), Path::new("fixtures"));
    }

    #[test]
    fn engine_parse_and_display() {
        assert_eq!("PUG".parse::<Engine>().unwrap(), Engine::Pug);
        assert_eq!(Engine::Tera.to_string(), "tera");
        assert!("jade".parse::<Engine>().is_err());
    }
}
