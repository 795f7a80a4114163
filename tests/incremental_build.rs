// tests/incremental_build.rs

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use assetdag::exec::{TaskContext, run_task};
use assetdag::fs::RealFileSystem;
use assetdag::mode::BuildMode;
use assetdag_test_utils::{ConfigFileBuilder, init_tracing};

fn write_old(path: &Path, contents: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
    let past = SystemTime::now() - Duration::from_secs(60);
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(past)
        .unwrap();
}

fn context(root: &Path) -> TaskContext {
    let cfg = ConfigFileBuilder::new().build_at(root);
    TaskContext::new(Arc::new(cfg), BuildMode::Development, Arc::new(RealFileSystem)).unwrap()
}

#[tokio::test]
async fn second_build_leaves_up_to_date_outputs_untouched() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_old(&root.join("src/fonts/a.woff"), b"font-a");
    write_old(&root.join("src/fonts/b.woff2"), b"font-b");
    let ctx = context(root);

    let first = run_task(&ctx, "fonts").await.unwrap();
    assert_eq!(first.written.len(), 2);
    let out = root.join("build/css/fonts/a.woff");
    let stamp = fs::metadata(&out).unwrap().modified().unwrap();

    let second = run_task(&ctx, "fonts").await.unwrap();
    assert!(second.written.is_empty());
    assert_eq!(fs::metadata(&out).unwrap().modified().unwrap(), stamp);
    assert_eq!(fs::read(&out).unwrap(), b"font-a");
}

#[tokio::test]
async fn clean_then_build_reprocesses_every_input() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_old(&root.join("src/js/app.js"), b"var a = 1;");
    write_old(&root.join("src/js/vendor/lib.js"), b"var b = 2;");
    let ctx = context(root);

    run_task(&ctx, "js").await.unwrap();
    assert!(run_task(&ctx, "js").await.unwrap().written.is_empty());

    run_task(&ctx, "clean").await.unwrap();
    assert!(!root.join("build").exists());

    let rebuilt = run_task(&ctx, "scripts").await.unwrap();
    assert_eq!(rebuilt.written.len(), 2);
    assert_eq!(
        fs::read_to_string(root.join("build/js/vendor/lib.js")).unwrap(),
        "var b = 2;"
    );
}
