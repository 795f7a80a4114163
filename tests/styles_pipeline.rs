// tests/styles_pipeline.rs
//
// Uses `cat` as the stylesheet compiler so the pipeline can run without a
// Sass install.

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use assetdag::exec::{TaskContext, run_task};
use assetdag::fs::RealFileSystem;
use assetdag::mode::BuildMode;
use assetdag::types::AssetKind;
use assetdag_test_utils::{ClassSectionBuilder, ConfigFileBuilder};

const SOURCE: &str = ".logo {\n  background: url(logo.png);\n  user-select: none;\n}\n";

fn build(mode: BuildMode) -> String {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src/scss")).unwrap();
    fs::write(dir.path().join("src/scss/main.scss"), SOURCE).unwrap();
    fs::write(dir.path().join("src/scss/_partial.scss"), ".unused {}").unwrap();

    let cfg = ConfigFileBuilder::new()
        .with_class(
            AssetKind::Styles,
            ClassSectionBuilder::new()
                .compiler(&["cat"])
                .browsers(&["safari 13"])
                .build(),
        )
        .build_at(dir.path());
    let ctx = TaskContext::new(Arc::new(cfg), mode, Arc::new(RealFileSystem)).unwrap();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let report = rt.block_on(run_task(&ctx, "sass")).unwrap();
    assert_eq!(report.ran, vec!["imguri", "sass"]);

    let css_dir = dir.path().join("build/css");
    assert!(!css_dir.join("_partial.css").exists());
    read(&css_dir.join("main.css"))
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn development_resolves_image_urls_without_minifying() {
    let css = build(BuildMode::Development);
    assert!(css.contains("../images/logo.png"), "css: {css}");
    assert!(css.contains('\n'), "css: {css}");
}

#[test]
fn production_prefixes_and_minifies() {
    let css = build(BuildMode::Production);
    assert!(css.contains("../images/logo.png"), "css: {css}");
    assert!(css.contains("-webkit-user-select"), "css: {css}");
    assert!(!css.trim_end().contains('\n'), "css: {css}");
}
