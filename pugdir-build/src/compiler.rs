//! [`DirectoryTemplateCompiler`]: the single build step.
//!
//! ## Build flow
//!
//! 1. Walk every input root and map templates to output paths ([`plan_build`]).
//! 2. Merge locals over options into a fresh config.
//! 3. For each entry: read → compile → ensure parent dir → atomic write.
//!
//! Entries run one at a time unless [`with_concurrency`] raises the limit.
//! The first failure aborts the build; files already written stay on disk.
//!
//! [`with_concurrency`]: DirectoryTemplateCompiler::with_concurrency

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use pugdir_core::{merge_config, HostOptions, InputPaths, InputRoots, Locals, Options, Suffixes};
use pugdir_renderer::{PugCompiler, TemplateCompiler};

use crate::error::{io_err, BuildError};
use crate::plan::{plan_build, PlanEntry};
use crate::writer::{write_output_holding, WriteResult};

// ---------------------------------------------------------------------------
// Build report
// ---------------------------------------------------------------------------

/// Outcome of one successful [`DirectoryTemplateCompiler::build`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    /// One entry per template, in plan order.
    pub writes: Vec<WriteResult>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl BuildReport {
    pub fn written(&self) -> usize {
        self.count(|w| matches!(w, WriteResult::Written { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|w| matches!(w, WriteResult::Unchanged { .. }))
    }

    pub fn would_write(&self) -> usize {
        self.count(|w| matches!(w, WriteResult::WouldWrite { .. }))
    }

    fn count(&self, pred: impl Fn(&WriteResult) -> bool) -> usize {
        self.writes.iter().filter(|w| pred(w)).count()
    }
}

// ---------------------------------------------------------------------------
// DirectoryTemplateCompiler
// ---------------------------------------------------------------------------

/// Compiles every template under one or more input roots into a mirrored
/// output tree.
#[derive(Clone)]
pub struct DirectoryTemplateCompiler {
    inputs: InputRoots,
    options: Options,
    locals: Locals,
    host: HostOptions,
    compiler: Arc<dyn TemplateCompiler>,
    suffixes: Suffixes,
    concurrency: usize,
    dry_run: bool,
}

impl fmt::Debug for DirectoryTemplateCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryTemplateCompiler")
            .field("inputs", &self.inputs)
            .field("options", &self.options)
            .field("locals", &self.locals)
            .field("host", &self.host)
            .field("engine", &self.compiler.name())
            .field("suffixes", &self.suffixes)
            .field("concurrency", &self.concurrency)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl DirectoryTemplateCompiler {
    /// Reserved host keys are removed from `options` here and kept apart as
    /// [`HostOptions`]. Uses the Pug engine until [`with_compiler`] says otherwise.
    ///
    /// [`with_compiler`]: DirectoryTemplateCompiler::with_compiler
    pub fn new(
        inputs: impl Into<InputPaths>,
        mut options: Options,
        locals: Locals,
    ) -> Result<Self, BuildError> {
        let inputs = inputs.into().into_roots()?;
        let host = HostOptions::strip_from(&mut options);
        Ok(DirectoryTemplateCompiler {
            inputs,
            options,
            locals,
            host,
            compiler: Arc::new(PugCompiler::new()),
            suffixes: Suffixes::default(),
            concurrency: 1,
            dry_run: false,
        })
    }

    pub fn with_compiler(mut self, compiler: Arc<dyn TemplateCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_suffixes(mut self, suffixes: Suffixes) -> Self {
        self.suffixes = suffixes;
        self
    }

    /// Maximum number of files processed at once. Zero is rejected by `build`.
    pub fn with_concurrency(mut self, jobs: usize) -> Self {
        self.concurrency = jobs;
        self
    }

    /// Compile everything but write nothing.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    // -- accessors ----------------------------------------------------------

    /// Options as passed to the engine (reserved keys already removed).
    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn locals(&self) -> &Locals {
        &self.locals
    }

    pub fn host_options(&self) -> &HostOptions {
        &self.host
    }

    pub fn input_roots(&self) -> &InputRoots {
        &self.inputs
    }

    pub fn suffixes(&self) -> &Suffixes {
        &self.suffixes
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn compiler(&self) -> &Arc<dyn TemplateCompiler> {
        &self.compiler
    }

    /// Fresh merge of locals over options. Neither input is modified.
    pub fn merged_config(&self) -> Options {
        merge_config(&self.options, &self.locals)
    }

    /// Templates this build would compile, without reading them.
    pub async fn plan(&self) -> Result<Vec<PlanEntry>, BuildError> {
        plan_build(&self.inputs, &self.suffixes).await
    }

    // -- build --------------------------------------------------------------

    /// Compile every template into `output`.
    pub async fn build(&self, output: &Path) -> Result<BuildReport, BuildError> {
        if self.concurrency == 0 {
            return Err(BuildError::InvalidArgument(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let started_at = Utc::now();
        let clock = Instant::now();
        let plan = self.plan().await?;
        tracing::info!(
            files = plan.len(),
            engine = self.compiler.name(),
            output = %output.display(),
            dry_run = self.dry_run,
            "build started",
        );

        let config = Arc::new(self.merged_config());
        let writes = if self.concurrency == 1 || plan.len() <= 1 {
            self.build_sequential(&plan, output, &config).await?
        } else {
            self.build_parallel(plan, output, config).await?
        };

        let report = BuildReport {
            writes,
            started_at,
            duration: clock.elapsed(),
        };
        tracing::info!(
            written = report.written(),
            unchanged = report.unchanged(),
            would_write = report.would_write(),
            duration_ms = report.duration.as_millis() as u64,
            "build finished",
        );
        Ok(report)
    }

    async fn build_sequential(
        &self,
        plan: &[PlanEntry],
        output: &Path,
        config: &Options,
    ) -> Result<Vec<WriteResult>, BuildError> {
        let mut writes = Vec::with_capacity(plan.len());
        for entry in plan {
            let result =
                process_entry(entry, output, self.compiler.as_ref(), config, self.dry_run, ())
                    .await?;
            writes.push(result);
        }
        Ok(writes)
    }

    async fn build_parallel(
        &self,
        plan: Vec<PlanEntry>,
        output: &Path,
        config: Arc<Options>,
    ) -> Result<Vec<WriteResult>, BuildError> {
        let jobs = u32::try_from(self.concurrency).map_err(|_| {
            BuildError::InvalidArgument(format!("concurrency {} is too large", self.concurrency))
        })?;
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut slots: Vec<Option<WriteResult>> = vec![None; plan.len()];
        let mut set = JoinSet::new();

        for (index, entry) in plan.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let compiler = self.compiler.clone();
            let config = config.clone();
            let output = output.to_path_buf();
            let dry_run = self.dry_run;
            set.spawn(async move {
                let permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| BuildError::Task(format!("semaphore closed: {e}")))?;
                let result =
                    process_entry(&entry, &output, compiler.as_ref(), &config, dry_run, permit)
                        .await?;
                Ok::<_, BuildError>((index, result))
            });
        }

        while let Some(joined) = set.join_next().await {
            let outcome = joined
                .map_err(|e| BuildError::Task(format!("worker join failure: {e}")))
                .and_then(|inner| inner);
            match outcome {
                Ok((index, result)) => slots[index] = Some(result),
                Err(err) => {
                    set.abort_all();
                    while set.join_next().await.is_some() {}
                    // Write jobs outlive their aborted tasks and hold a permit until done.
                    let _settled = semaphore.acquire_many(jobs).await;
                    tracing::error!(error = %err, "build aborted");
                    return Err(err);
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

// ---------------------------------------------------------------------------
// Per-file work
// ---------------------------------------------------------------------------

/// Read and compile one template. Errors carry the root-relative path.
pub(crate) async fn compile_entry(
    entry: &PlanEntry,
    compiler: &dyn TemplateCompiler,
    config: &Options,
) -> Result<String, BuildError> {
    let source_path = entry.source_path();
    let source = tokio::fs::read_to_string(&source_path)
        .await
        .map_err(|e| io_err(&source_path, e))?;
    let compiled = compiler
        .compile(&source, config)
        .map_err(|source| BuildError::Compile {
            path: entry.source.clone(),
            source,
        })?;
    tracing::debug!(source = %source_path.display(), "compiled");
    Ok(compiled)
}

/// Compile and write one entry. `guard` is held until the write has landed.
async fn process_entry<G: Send + 'static>(
    entry: &PlanEntry,
    output: &Path,
    compiler: &dyn TemplateCompiler,
    config: &Options,
    dry_run: bool,
    guard: G,
) -> Result<WriteResult, BuildError> {
    let compiled = compile_entry(entry, compiler, config).await?;
    let target: PathBuf = output.join(&entry.output);
    write_output_holding(&target, &compiled, dry_run, guard).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pugdir_renderer::CompileError;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn options(value: serde_json::Value) -> Options {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Options::new(),
        }
    }

    fn echo() -> Arc<dyn TemplateCompiler> {
        Arc::new(|source: &str, _: &Options| -> Result<String, CompileError> {
            Ok(source.trim().to_uppercase())
        })
    }

    fn tree(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (rel, body) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        dir
    }

    #[test]
    fn reserved_keys_are_stripped_at_construction() {
        let compiler = DirectoryTemplateCompiler::new(
            "src",
            options(json!({"annotation": "site", "persistentOutput": true, "pretty": false})),
            Locals::new(),
        )
        .unwrap();
        assert_eq!(compiler.options(), &options(json!({"pretty": false})));
        assert_eq!(compiler.host_options().annotation.as_deref(), Some("site"));
        assert!(compiler.host_options().persistent_output);
    }

    #[test]
    fn empty_input_list_is_invalid() {
        let err = DirectoryTemplateCompiler::new(Vec::<PathBuf>::new(), Options::new(), Locals::new())
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidArgument(_)), "got: {err}");
    }

    #[test]
    fn merged_config_prefers_locals_and_leaves_inputs_alone() {
        let compiler = DirectoryTemplateCompiler::new(
            "src",
            options(json!({"title": "option", "keep": 1})),
            options(json!({"title": "local"})),
        )
        .unwrap();
        let merged = compiler.merged_config();
        assert_eq!(merged, options(json!({"title": "local", "keep": 1})));
        assert_eq!(compiler.options(), &options(json!({"title": "option", "keep": 1})));
        assert_eq!(compiler.merged_config(), merged);
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let src = tree(&[("a.pug", "p")]);
        let out = TempDir::new().unwrap();
        let err = DirectoryTemplateCompiler::new(src.path(), Options::new(), Locals::new())
            .unwrap()
            .with_concurrency(0)
            .build(out.path())
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn parallel_build_matches_sequential_build() {
        let files: Vec<(String, String)> = (0..12)
            .map(|i| (format!("dir{}/page{i}.pug", i % 3), format!("page {i}")))
            .collect();
        let refs: Vec<(&str, &str)> = files.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let src = tree(&refs);

        let seq_out = TempDir::new().unwrap();
        let par_out = TempDir::new().unwrap();
        let base = DirectoryTemplateCompiler::new(src.path(), Options::new(), Locals::new())
            .unwrap()
            .with_compiler(echo());

        let seq = base.clone().build(seq_out.path()).await.unwrap();
        let par = base.with_concurrency(4).build(par_out.path()).await.unwrap();
        assert_eq!(seq.written(), 12);
        assert_eq!(par.written(), 12);

        for (rel, body) in &files {
            let html = rel.replace(".pug", ".html");
            assert_eq!(fs::read_to_string(par_out.path().join(&html)).unwrap(), body.to_uppercase());
            assert_eq!(
                fs::read_to_string(seq_out.path().join(&html)).unwrap(),
                fs::read_to_string(par_out.path().join(&html)).unwrap()
            );
        }
        let order: Vec<_> = par.writes.iter().map(|w| w.path().to_path_buf()).collect();
        let expected: Vec<_> = seq
            .writes
            .iter()
            .map(|w| par_out.path().join(w.path().strip_prefix(seq_out.path()).unwrap()))
            .collect();
        assert_eq!(order, expected, "report keeps plan order");
    }

    #[tokio::test]
    async fn parallel_failure_surfaces_the_compile_error() {
        let src = tree(&[("a.pug", "ok"), ("b.pug", "fail"), ("c.pug", "ok"), ("d.pug", "ok")]);
        let out = TempDir::new().unwrap();
        let failing: Arc<dyn TemplateCompiler> =
            Arc::new(|source: &str, _: &Options| -> Result<String, CompileError> {
                if source == "fail" {
                    Err(CompileError::Syntax {
                        line: 1,
                        message: "boom".to_string(),
                    })
                } else {
                    Ok(source.to_string())
                }
            });

        let err = DirectoryTemplateCompiler::new(src.path(), Options::new(), Locals::new())
            .unwrap()
            .with_compiler(failing)
            .with_concurrency(3)
            .build(out.path())
            .await
            .unwrap_err();
        match err {
            BuildError::Compile { path, .. } => assert_eq!(path, PathBuf::from("b.pug")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn aborted_parallel_build_leaves_no_tmp_files() {
        let mut files: Vec<(String, &str)> = (0..48)
            .map(|i| (format!("page-{i:02}.pug"), "ok"))
            .collect();
        files.push(("page-24-broken.pug".to_string(), "fail"));
        let refs: Vec<(&str, &str)> = files.iter().map(|(n, c)| (n.as_str(), *c)).collect();
        let src = tree(&refs);
        let failing: Arc<dyn TemplateCompiler> =
            Arc::new(|source: &str, _: &Options| -> Result<String, CompileError> {
                match source {
                    "fail" => Err(CompileError::Syntax {
                        line: 1,
                        message: "boom".to_string(),
                    }),
                    other => Ok(other.repeat(4096)),
                }
            });

        for _ in 0..5 {
            let out = TempDir::new().unwrap();
            let err = DirectoryTemplateCompiler::new(src.path(), Options::new(), Locals::new())
                .unwrap()
                .with_compiler(failing.clone())
                .with_concurrency(8)
                .build(out.path())
                .await
                .unwrap_err();
            assert!(matches!(err, BuildError::Compile { .. }), "{err}");

            let leftovers: Vec<_> = fs::read_dir(out.path())
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .filter(|name| name.ends_with(crate::writer::TMP_SUFFIX))
                .collect();
            assert!(leftovers.is_empty(), "stray temporary files: {leftovers:?}");
        }
    }

    #[tokio::test]
    async fn compiled_bytes_are_written_unchanged() {
        let src = tree(&[("crlf.pug", "ignored")]);
        let out = TempDir::new().unwrap();
        let crlf: Arc<dyn TemplateCompiler> =
            Arc::new(|_: &str, _: &Options| -> Result<String, CompileError> {
                Ok("line1\r\nline2".to_string())
            });
        DirectoryTemplateCompiler::new(src.path(), Options::new(), Locals::new())
            .unwrap()
            .with_compiler(crlf)
            .build(out.path())
            .await
            .unwrap();
        assert_eq!(fs::read(out.path().join("crlf.html")).unwrap(), b"line1\r\nline2");
    }

    #[tokio::test]
    async fn dry_run_reports_would_write() {
        let src = tree(&[("a.pug", "p one"), ("b.pug", "p two")]);
        let out = TempDir::new().unwrap();
        let report = DirectoryTemplateCompiler::new(src.path(), Options::new(), Locals::new())
            .unwrap()
            .dry_run(true)
            .build(out.path())
            .await
            .unwrap();
        assert_eq!(report.would_write(), 2);
        assert!(!out.path().join("a.html").exists());
    }
}
