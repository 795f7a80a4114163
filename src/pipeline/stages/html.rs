// src/pipeline/stages/html.rs

//! HTML template preprocessing and minification.
//!
//! Directives live in HTML comments:
//!
//! ```text
//! <!-- @if devBuild -->   <!-- @if !devBuild -->   <!-- @if NAME == 'x' -->
//! <!-- @ifdef NAME -->    <!-- @ifndef NAME -->
//! <!-- @else -->          <!-- @endif -->
//! <!-- @echo NAME -->     <!-- @include template/head.html -->
//! ```
//!
//! Includes resolve relative to the including file and are preprocessed
//! with the same context.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::config::model::ProjectInfo;
use crate::errors::StageError;
use crate::fs::FileSystem;
use crate::mode::BuildMode;
use crate::pipeline::{Asset, Stage, StageFuture, StageResult, ready};

use super::log_size;

const PREPROCESS: &str = "preprocess";
const MAX_INCLUDE_DEPTH: usize = 16;

static DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--\s*@(\w+)\b[ \t]*(.*?)\s*-->").unwrap());

static COMPARISON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\w+)\s*(==|!=)\s*(?:'([^']*)'|"([^"]*)"|(\S+))$"#).unwrap()
});

/// Template context: `devBuild`, `name`, `version`, `author`, plus
/// user-supplied entries (which win on conflict).
pub fn template_context(
    project: &ProjectInfo,
    mode: BuildMode,
    extra: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut context = BTreeMap::new();
    context.insert(
        "devBuild".to_string(),
        (!mode.is_production()).to_string(),
    );
    context.insert("name".to_string(), project.name.clone());
    context.insert("version".to_string(), project.version.clone());
    context.insert("author".to_string(), project.author.clone());
    context.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    context
}

/// Resolves template directives.
#[derive(Debug)]
pub struct Preprocess {
    context: BTreeMap<String, String>,
    fs: Arc<dyn FileSystem>,
}

impl Preprocess {
    pub fn new(context: BTreeMap<String, String>, fs: Arc<dyn FileSystem>) -> Self {
        Self { context, fs }
    }

    fn render(&self, source: &Path, text: &str, depth: usize) -> Result<String, StageError> {
        let fail = |message: String| StageError::new(PREPROCESS, source, message);

        // Each frame: (parent active, condition held, else seen).
        let mut frames: Vec<(bool, bool, bool)> = Vec::new();
        let mut active = true;
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;

        for caps in DIRECTIVE.captures_iter(text) {
            let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((cursor, cursor));
            if active {
                out.push_str(&text[cursor..whole.0]);
            }
            cursor = whole.1;

            let keyword = &caps[1];
            let arg = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");

            match keyword {
                "if" | "ifdef" | "ifndef" => {
                    let holds = match keyword {
                        "if" => self.eval(arg).map_err(fail)?,
                        "ifdef" => self.context.contains_key(arg),
                        _ => !self.context.contains_key(arg),
                    };
                    frames.push((active, holds, false));
                    active = active && holds;
                }
                "else" => {
                    let frame = frames
                        .last_mut()
                        .ok_or_else(|| fail("@else without matching @if".to_string()))?;
                    if frame.2 {
                        return Err(fail("duplicate @else".to_string()));
                    }
                    frame.2 = true;
                    active = frame.0 && !frame.1;
                }
                "endif" => {
                    let (parent, _, _) = frames
                        .pop()
                        .ok_or_else(|| fail("@endif without matching @if".to_string()))?;
                    active = parent;
                }
                "echo" => {
                    if active {
                        if let Some(value) = self.context.get(arg) {
                            out.push_str(value);
                        }
                    }
                }
                "include" => {
                    if active {
                        out.push_str(&self.include(source, arg, depth)?);
                    }
                }
                other => return Err(fail(format!("unknown directive @{other}"))),
            }
        }

        if !frames.is_empty() {
            return Err(fail(format!("{} unterminated @if block(s)", frames.len())));
        }
        if active {
            out.push_str(&text[cursor..]);
        }
        Ok(out)
    }

    fn include(&self, from: &Path, target: &str, depth: usize) -> Result<String, StageError> {
        if target.is_empty() {
            return Err(StageError::new(PREPROCESS, from, "@include needs a path"));
        }
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(StageError::new(
                PREPROCESS,
                from,
                format!("includes nested deeper than {MAX_INCLUDE_DEPTH} levels"),
            ));
        }
        let path = from
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(target.trim_matches(|c| c == '"' || c == '\''));
        let text = self.fs.read_to_string(&path).map_err(|e| {
            StageError::new(PREPROCESS, from, format!("cannot include {}: {e:#}", path.display()))
        })?;
        self.render(&path, &text, depth + 1)
    }

    /// `NAME`, `!NAME`, `NAME == 'x'`, `NAME != 'x'`.
    fn eval(&self, expr: &str) -> Result<bool, String> {
        if expr.is_empty() {
            return Err("@if needs a condition".to_string());
        }
        if let Some(caps) = COMPARISON.captures(expr) {
            let left = self.context.get(&caps[1]).map(String::as_str).unwrap_or("");
            let right = caps
                .get(3)
                .or_else(|| caps.get(4))
                .or_else(|| caps.get(5))
                .map(|m| m.as_str())
                .unwrap_or("");
            return Ok(match &caps[2] {
                "==" => left == right,
                _ => left != right,
            });
        }
        match expr.strip_prefix('!') {
            Some(name) => Ok(!self.truthy(name.trim())),
            None => Ok(self.truthy(expr)),
        }
    }

    fn truthy(&self, name: &str) -> bool {
        match self.context.get(name) {
            Some(value) => !matches!(value.as_str(), "" | "false" | "0"),
            None => false,
        }
    }
}

impl Stage for Preprocess {
    fn name(&self) -> &'static str {
        PREPROCESS
    }

    fn apply<'a>(&'a self, assets: Vec<Asset>) -> StageFuture<'a> {
        let result: StageResult = assets
            .into_iter()
            .map(|mut asset| -> Result<Asset, StageError> {
                let rendered = self.render(&asset.source, asset.text(PREPROCESS)?, 0)?;
                asset.contents = rendered.into_bytes();
                Ok(asset)
            })
            .collect();
        ready(result)
    }
}

/// Production HTML minification via `minify-html`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinifyHtml;

impl Stage for MinifyHtml {
    fn name(&self) -> &'static str {
        "minify-html"
    }

    fn apply<'a>(&'a self, assets: Vec<Asset>) -> StageFuture<'a> {
        let mut cfg = minify_html::Cfg::new();
        cfg.keep_closing_tags = true;
        cfg.keep_html_and_head_opening_tags = true;
        cfg.keep_comments = false;
        cfg.minify_css = true;
        cfg.minify_js = true;

        let minified = assets
            .into_iter()
            .map(|mut asset| {
                let before = asset.contents.len();
                asset.contents = minify_html::minify(&asset.contents, &cfg);
                log_size(self.name(), &asset, before);
                asset
            })
            .collect();
        ready(Ok(minified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use std::path::PathBuf;

    fn preprocess(fs: &MockFileSystem, mode: BuildMode) -> Preprocess {
        let project = ProjectInfo {
            name: "site".into(),
            version: "1.2.3".into(),
            author: "Ada".into(),
            ..ProjectInfo::default()
        };
        Preprocess::new(
            template_context(&project, mode, &BTreeMap::new()),
            Arc::new(fs.clone()),
        )
    }

    fn render(p: &Preprocess, text: &str) -> Result<String, StageError> {
        p.render(&PathBuf::from("/p/src/index.html"), text, 0)
    }

    #[test]
    fn dev_blocks_follow_the_mode() {
        let fs = MockFileSystem::new();
        let text = "a<!-- @if devBuild -->DEV<!-- @else -->PROD<!-- @endif -->b";

        assert_eq!(render(&preprocess(&fs, BuildMode::Development), text).unwrap(), "aDEVb");
        assert_eq!(render(&preprocess(&fs, BuildMode::Production), text).unwrap(), "aPRODb");
    }

    #[test]
    fn echo_and_comparison() {
        let fs = MockFileSystem::new();
        let p = preprocess(&fs, BuildMode::Development);
        let out = render(
            &p,
            "<!-- @echo name --> v<!-- @echo version --><!-- @if author == 'Ada' -->!<!-- @endif -->",
        )
        .unwrap();
        assert_eq!(out, "site v1.2.3!");
    }

    #[test]
    fn nested_inactive_blocks_stay_hidden() {
        let fs = MockFileSystem::new();
        let p = preprocess(&fs, BuildMode::Production);
        let out = render(
            &p,
            "<!-- @if devBuild --><!-- @ifdef name -->x<!-- @else -->y<!-- @endif --><!-- @endif -->z",
        )
        .unwrap();
        assert_eq!(out, "z");
    }

    #[test]
    fn includes_resolve_relative_to_the_including_file() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/template/head.html", "<title><!-- @echo name --></title>");
        let p = preprocess(&fs, BuildMode::Development);

        let out = render(&p, "<!-- @include template/head.html -->").unwrap();
        assert_eq!(out, "<title>site</title>");
    }

    #[test]
    fn unbalanced_block_is_an_error() {
        let fs = MockFileSystem::new();
        let err = render(&preprocess(&fs, BuildMode::Development), "<!-- @if devBuild -->x")
            .unwrap_err();
        assert_eq!(err.stage, PREPROCESS);
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn missing_include_is_an_error() {
        let fs = MockFileSystem::new();
        let err = render(
            &preprocess(&fs, BuildMode::Development),
            "<!-- @include template/nope.html -->",
        )
        .unwrap_err();
        assert!(err.message.contains("cannot include"));
        assert_eq!(err.path, PathBuf::from("/p/src/index.html"));
    }

    #[test]
    fn plain_comments_pass_through() {
        let fs = MockFileSystem::new();
        let out = render(&preprocess(&fs, BuildMode::Development), "<!-- note -->").unwrap();
        assert_eq!(out, "<!-- note -->");
    }
}
