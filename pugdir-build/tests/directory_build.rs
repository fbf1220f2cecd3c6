use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use pugdir_build::{BuildError, DirectoryTemplateCompiler, Host, WriteResult};
use pugdir_core::{Locals, Options};
use rstest::rstest;
use serde_json::{json, Value};
use tempfile::TempDir;

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn expects() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("expects")
}

fn map(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn page_locals() -> Locals {
    map(json!({"pageTitle": "Pug", "youAreUsingPug": true}))
}

async fn build_fixtures(locals: Locals) -> TempDir {
    let out = TempDir::new().expect("tempdir");
    DirectoryTemplateCompiler::new(fixtures(), Options::new(), locals)
        .expect("construct")
        .build(out.path())
        .await
        .expect("build");
    out
}

fn read(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    fs::read_to_string(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

fn relative_files(root: &Path) -> BTreeSet<PathBuf> {
    fn visit(root: &Path, dir: &Path, out: &mut BTreeSet<PathBuf>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                visit(root, &path, out);
            } else {
                out.insert(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }
    let mut out = BTreeSet::new();
    visit(root, root, &mut out);
    out
}

// ---------------------------------------------------------------------------
// 1. Output matches the checked-in expectations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn compiles_pug_to_html() {
    let out = build_fixtures(Locals::new()).await;
    assert_eq!(
        read(out.path().join("basic-compile.html")),
        read(expects().join("basic-compile.html"))
    );
}

#[tokio::test]
async fn compiles_with_locals() {
    let out = build_fixtures(page_locals()).await;
    assert_eq!(
        read(out.path().join("locals-compile.html")),
        read(expects().join("locals-compile.html"))
    );
}

#[tokio::test]
async fn locals_output_is_byte_identical_across_builds() {
    let first = build_fixtures(page_locals()).await;
    let second = build_fixtures(page_locals()).await;
    assert_eq!(
        fs::read(first.path().join("locals-compile.html")).unwrap(),
        fs::read(second.path().join("locals-compile.html")).unwrap()
    );
}

#[rstest]
#[case("level-1/basic-compile-lvl-1.html")]
#[case("level-1/level-2/basic-compile-lvl-2.html")]
#[tokio::test]
async fn mirrors_nested_folders(#[case] rel: &str) {
    let out = build_fixtures(Locals::new()).await;
    assert_eq!(read(out.path().join(rel)), read(expects().join(rel)));
}

// ---------------------------------------------------------------------------
// 2. Output set
// ---------------------------------------------------------------------------

#[tokio::test]
async fn output_set_is_exactly_the_swapped_templates() {
    let out = build_fixtures(Locals::new()).await;
    let expected: BTreeSet<PathBuf> = [
        "basic-compile.html",
        "locals-compile.html",
        "level-1/basic-compile-lvl-1.html",
        "level-1/level-2/basic-compile-lvl-2.html",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect();
    assert_eq!(relative_files(out.path()), expected);
}

#[tokio::test]
async fn non_template_files_are_not_compiled_or_copied() {
    let out = build_fixtures(Locals::new()).await;
    assert!(!out.path().join("basic-not-compile.js").exists());
    assert!(!out.path().join("basic-not-compile.html").exists());
    let err = fs::read_to_string(out.path().join("basic-not-compile.js")).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
}

// ---------------------------------------------------------------------------
// 3. Construction surface
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_path_and_one_element_vec_behave_identically() {
    let single_out = TempDir::new().unwrap();
    let vec_out = TempDir::new().unwrap();

    let single = DirectoryTemplateCompiler::new(fixtures(), Options::new(), page_locals()).unwrap();
    let many = DirectoryTemplateCompiler::new(vec![fixtures()], Options::new(), page_locals()).unwrap();
    assert_eq!(single.input_roots(), many.input_roots());

    single.build(single_out.path()).await.unwrap();
    many.build(vec_out.path()).await.unwrap();

    let files = relative_files(single_out.path());
    assert_eq!(files, relative_files(vec_out.path()));
    for rel in files {
        assert_eq!(read(single_out.path().join(&rel)), read(vec_out.path().join(&rel)));
    }
}

#[tokio::test]
async fn multiple_roots_are_accepted() {
    let out = TempDir::new().unwrap();
    let compiler =
        DirectoryTemplateCompiler::new(vec![fixtures(), expects()], Options::new(), Locals::new())
            .unwrap();
    assert_eq!(compiler.input_roots().len(), 2);
    let report = compiler.build(out.path()).await.unwrap();
    assert_eq!(report.writes.len(), 4, "expects/ holds no templates");
}

#[test]
fn persistent_output_is_removed_from_options() {
    let compiler = DirectoryTemplateCompiler::new(
        fixtures(),
        map(json!({"persistentOutput": true, "annotation": "pages"})),
        Locals::new(),
    )
    .unwrap();
    assert!(compiler.options().get("persistentOutput").is_none());
    assert!(compiler.options().get("annotation").is_none());
    assert!(compiler.host_options().persistent_output);
}

#[test]
fn locals_keep_reserved_names() {
    let compiler = DirectoryTemplateCompiler::new(
        fixtures(),
        Options::new(),
        map(json!({"annotation": "visible to templates"})),
    )
    .unwrap();
    assert_eq!(compiler.locals().get("annotation"), Some(&json!("visible to templates")));
    assert_eq!(compiler.host_options().annotation, None);
}

// ---------------------------------------------------------------------------
// 4. Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn syntax_error_fails_the_build_with_the_relative_path() {
    let src = TempDir::new().unwrap();
    fs::create_dir_all(src.path().join("broken")).unwrap();
    fs::write(src.path().join("broken/page.pug"), "div\n  include nav.pug\n").unwrap();
    let out = TempDir::new().unwrap();

    let err = DirectoryTemplateCompiler::new(src.path(), Options::new(), Locals::new())
        .unwrap()
        .build(out.path())
        .await
        .unwrap_err();
    match &err {
        BuildError::Compile { path, source } => {
            assert_eq!(path, &PathBuf::from("broken/page.pug"));
            assert_eq!(source.line(), Some(2));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("broken/page.pug"));
}

#[tokio::test]
async fn failure_stops_the_build_and_keeps_earlier_outputs() {
    let src = TempDir::new().unwrap();
    fs::write(src.path().join("a.pug"), "p first\n").unwrap();
    fs::write(src.path().join("b.pug"), "p\n  extends layout\n").unwrap();
    fs::write(src.path().join("c.pug"), "p third\n").unwrap();
    let out = TempDir::new().unwrap();

    let compiler = DirectoryTemplateCompiler::new(src.path(), Options::new(), Locals::new()).unwrap();
    assert_eq!(compiler.concurrency(), 1);
    let err = compiler.build(out.path()).await.unwrap_err();

    match &err {
        BuildError::Compile { path, .. } => assert_eq!(path, &PathBuf::from("b.pug")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(read(out.path().join("a.html")), "<p>first</p>");
    assert!(!out.path().join("b.html").exists());
    assert!(!out.path().join("c.html").exists(), "work after the failure must not run");
}

#[tokio::test]
async fn non_utf8_source_is_an_io_error() {
    let src = TempDir::new().unwrap();
    fs::write(src.path().join("bad.pug"), [0xff, 0xfe, 0x00]).unwrap();
    let out = TempDir::new().unwrap();

    let err = DirectoryTemplateCompiler::new(src.path(), Options::new(), Locals::new())
        .unwrap()
        .build(out.path())
        .await
        .unwrap_err();
    match err {
        BuildError::Io { path, .. } => assert_eq!(path, src.path().join("bad.pug")),
        other => panic!("unexpected error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// 5. Rebuilds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unchanged_output_keeps_its_mtime() {
    let out = build_fixtures(Locals::new()).await;
    let target = out.path().join("basic-compile.html");
    let old = FileTime::from_unix_time(1_000_000_000, 0);
    filetime::set_file_mtime(&target, old).unwrap();

    let report = DirectoryTemplateCompiler::new(fixtures(), Options::new(), Locals::new())
        .unwrap()
        .build(out.path())
        .await
        .unwrap();

    assert_eq!(report.written(), 0);
    assert_eq!(report.unchanged(), 4);
    let mtime = FileTime::from_last_modification_time(&fs::metadata(&target).unwrap());
    assert_eq!(mtime, old, "identical output must not be rewritten");
}

#[tokio::test]
async fn changed_locals_rewrite_only_affected_files() {
    let out = build_fixtures(Locals::new()).await;
    let report = DirectoryTemplateCompiler::new(fixtures(), Options::new(), page_locals())
        .unwrap()
        .build(out.path())
        .await
        .unwrap();

    let written: Vec<&Path> = report
        .writes
        .iter()
        .filter(|w| matches!(w, WriteResult::Written { .. }))
        .map(|w| w.path())
        .collect();
    assert_eq!(written, vec![out.path().join("locals-compile.html").as_path()]);
}

#[tokio::test]
async fn host_build_replaces_stale_output() {
    let out = TempDir::new().unwrap();
    fs::write(out.path().join("removed-page.html"), "stale").unwrap();

    let compiler = DirectoryTemplateCompiler::new(fixtures(), Options::new(), page_locals()).unwrap();
    Host::new(compiler, out.path()).build().await.unwrap();

    assert!(!out.path().join("removed-page.html").exists());
    assert_eq!(
        read(out.path().join("locals-compile.html")),
        read(expects().join("locals-compile.html"))
    );
}
