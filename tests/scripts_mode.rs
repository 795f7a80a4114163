// tests/scripts_mode.rs

use std::fs;
use std::path::Path;
use std::sync::Arc;

use assetdag::exec::{TaskContext, run_task};
use assetdag::fs::RealFileSystem;
use assetdag::mode::BuildMode;
use assetdag_test_utils::ConfigFileBuilder;

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src/js")).unwrap();
    fs::write(dir.path().join("src/js/a.js"), "var x = 1;\n").unwrap();
    fs::write(dir.path().join("src/js/b.js"), "var y = 2;\n").unwrap();
    dir
}

fn context(root: &Path, mode: BuildMode) -> TaskContext {
    let cfg = ConfigFileBuilder::new().build_at(root);
    TaskContext::new(Arc::new(cfg), mode, Arc::new(RealFileSystem)).unwrap()
}

#[tokio::test]
async fn production_concatenates_and_minifies() {
    let dir = project();
    let ctx = context(dir.path(), BuildMode::Production);

    run_task(&ctx, "js").await.unwrap();

    let out_dir = dir.path().join("build/js");
    let names: Vec<String> = fs::read_dir(&out_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["main.js"]);

    let bundle = fs::read_to_string(out_dir.join("main.js")).unwrap();
    assert!(bundle.contains("x=1"), "bundle: {bundle}");
    assert!(bundle.contains("y=2"), "bundle: {bundle}");
    assert!(!bundle.contains('\n'), "bundle: {bundle}");
}

#[tokio::test]
async fn development_copies_each_file_unmodified() {
    let dir = project();
    let ctx = context(dir.path(), BuildMode::Development);

    run_task(&ctx, "js").await.unwrap();

    let out_dir = dir.path().join("build/js");
    assert_eq!(fs::read_to_string(out_dir.join("a.js")).unwrap(), "var x = 1;\n");
    assert_eq!(fs::read_to_string(out_dir.join("b.js")).unwrap(), "var y = 2;\n");
    assert!(!out_dir.join("main.js").exists());
}
