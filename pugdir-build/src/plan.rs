//! Source → output mapping for one build, computed before anything is read.

use std::collections::HashMap;
use std::path::PathBuf;

use pugdir_core::{InputRoots, Suffixes};

use crate::error::BuildError;
use crate::walk::walk_files;

/// One template and where its output lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    /// Input root the template was found under.
    pub root: PathBuf,
    /// Template path relative to `root`.
    pub source: PathBuf,
    /// Output path relative to the output directory.
    pub output: PathBuf,
}

impl PlanEntry {
    /// Absolute (or root-relative) path of the template on disk.
    pub fn source_path(&self) -> PathBuf {
        self.root.join(&self.source)
    }
}

/// Walk every root in order and map each template to its output path.
///
/// Non-template files are dropped. Two templates mapping to the same output
/// path is an [`BuildError::OutputCollision`]; an empty template suffix is
/// [`BuildError::InvalidArgument`].
pub async fn plan_build(
    roots: &InputRoots,
    suffixes: &Suffixes,
) -> Result<Vec<PlanEntry>, BuildError> {
    suffixes.validate()?;
    let mut entries = Vec::new();
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();

    for root in roots {
        for source in walk_files(root).await? {
            let Some(output) = suffixes.output_path(&source) else {
                tracing::debug!(path = %root.join(&source).display(), "skipping non-template file");
                continue;
            };
            let source_path = root.join(&source);
            if let Some(first) = claimed.insert(output.clone(), source_path.clone()) {
                return Err(BuildError::OutputCollision {
                    output,
                    first,
                    second: source_path,
                });
            }
            entries.push(PlanEntry {
                root: root.clone(),
                source,
                output,
            });
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &std::path::Path, rel: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, "p").unwrap();
    }

    #[tokio::test]
    async fn maps_templates_and_skips_the_rest() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "index.pug");
        touch(dir.path(), "style.css");
        touch(dir.path(), "docs/guide.pug");

        let roots = InputRoots::new([dir.path()]).unwrap();
        let plan = plan_build(&roots, &Suffixes::default()).await.unwrap();
        let outputs: Vec<_> = plan.iter().map(|e| e.output.clone()).collect();
        assert_eq!(outputs, vec![PathBuf::from("docs/guide.html"), PathBuf::from("index.html")]);
        assert_eq!(plan[1].source_path(), dir.path().join("index.pug"));
    }

    #[tokio::test]
    async fn roots_are_walked_in_order() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        touch(a.path(), "z.pug");
        touch(b.path(), "a.pug");

        let roots = InputRoots::new([a.path(), b.path()]).unwrap();
        let plan = plan_build(&roots, &Suffixes::default()).await.unwrap();
        assert_eq!(plan[0].root, a.path());
        assert_eq!(plan[1].root, b.path());
    }

    #[tokio::test]
    async fn colliding_outputs_across_roots_are_rejected() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        touch(a.path(), "index.pug");
        touch(b.path(), "index.pug");

        let roots = InputRoots::new([a.path(), b.path()]).unwrap();
        let err = plan_build(&roots, &Suffixes::default()).await.unwrap_err();
        match err {
            BuildError::OutputCollision { output, first, second } => {
                assert_eq!(output, PathBuf::from("index.html"));
                assert_eq!(first, a.path().join("index.pug"));
                assert_eq!(second, b.path().join("index.pug"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_template_suffix_is_rejected() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "style.css");

        let roots = InputRoots::new([dir.path()]).unwrap();
        let err = plan_build(&roots, &Suffixes::new("", ".html")).await.unwrap_err();
        assert!(matches!(err, BuildError::InvalidArgument(_)), "{err}");
    }
}
