// src/pipeline/stages/styles.rs

//! Stylesheet stages: external compile, url rebasing, prefixing.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use regex::{Captures, Regex};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::errors::StageError;
use crate::pipeline::{Asset, Stage, StageFuture, StageResult, ready};

use super::log_size;

const COMPILE: &str = "compile";
const PREFIX: &str = "prefix";

// `url(...)` tokens and quoted strings match first and pass through as-is;
// only group 1 is a numeric value.
static DECIMAL_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\([^)]*\)|"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|(\d*\.\d+)"#).unwrap()
});

static URL_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]*))\s*\)"#).unwrap()
});

/// Turn browserslist queries into `lightningcss` targets.
pub fn browser_targets(queries: &[String]) -> Result<Option<Browsers>, String> {
    if queries.is_empty() {
        return Ok(None);
    }
    Browsers::from_browserslist(queries.iter().map(String::as_str)).map_err(|e| e.to_string())
}

/// Runs the configured compiler with the source on stdin and takes stdout
/// as the compiled CSS.
#[derive(Debug, Clone)]
pub struct Compile {
    command: Vec<String>,
    cwd: PathBuf,
    precision: u32,
}

impl Compile {
    pub fn new(command: Vec<String>, cwd: PathBuf, precision: u32) -> Self {
        Self {
            command,
            cwd,
            precision,
        }
    }

    async fn compile(&self, mut asset: Asset) -> Result<Asset, StageError> {
        let fail = |message: String| StageError::new(COMPILE, &asset.source, message);

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| fail("no compiler configured".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| fail(format!("spawning `{program}`: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&asset.contents)
                .await
                .map_err(|e| fail(format!("writing to `{program}`: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| fail(format!("waiting for `{program}`: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(format!(
                "`{program}` exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let css = String::from_utf8(output.stdout)
            .map_err(|e| fail(format!("compiler output is not UTF-8: {e}")))?;

        asset.contents = round_decimals(&css, self.precision).into_bytes();
        asset.rel = asset.rel.with_extension("css");
        Ok(asset)
    }
}

impl Stage for Compile {
    fn name(&self) -> &'static str {
        COMPILE
    }

    fn apply<'a>(&'a self, assets: Vec<Asset>) -> StageFuture<'a> {
        Box::pin(async move {
            let mut out = Vec::with_capacity(assets.len());
            for asset in assets {
                out.push(self.compile(asset).await?);
            }
            Ok(out)
        })
    }
}

/// Round decimals with more than `precision` places, trimming trailing zeros.
///
/// Digits inside `url(...)` and quoted strings are left alone.
pub fn round_decimals(css: &str, precision: u32) -> String {
    DECIMAL_TOKEN
        .replace_all(css, |caps: &Captures| {
            let Some(number) = caps.get(1) else {
                return caps[0].to_string();
            };
            let raw = number.as_str();
            let places = raw.split('.').nth(1).map(str::len).unwrap_or(0);
            if places as u32 <= precision {
                return raw.to_string();
            }
            match raw.parse::<f64>() {
                Ok(value) => {
                    let mut s = format!("{:.*}", precision as usize, value);
                    if s.contains('.') {
                        s = s.trim_end_matches('0').trim_end_matches('.').to_string();
                    }
                    if raw.starts_with('.') {
                        if let Some(stripped) = s.strip_prefix('0') {
                            if stripped.starts_with('.') {
                                s = stripped.to_string();
                            }
                        }
                    }
                    s
                }
                Err(_) => raw.to_string(),
            }
        })
        .into_owned()
}

/// Prefixes relative `url(...)` references with the image path.
#[derive(Debug, Clone)]
pub struct RebaseUrls {
    prefix: String,
}

impl RebaseUrls {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    pub fn rebase(&self, css: &str) -> String {
        URL_REF
            .replace_all(css, |caps: &Captures| {
                let (url, quote) = if let Some(m) = caps.get(1) {
                    (m.as_str(), "\"")
                } else if let Some(m) = caps.get(2) {
                    (m.as_str(), "'")
                } else {
                    (caps.get(3).map(|m| m.as_str()).unwrap_or(""), "")
                };
                if is_absolute_url(url) {
                    return caps[0].to_string();
                }
                format!("url({quote}{}{url}{quote})", self.prefix)
            })
            .into_owned()
    }
}

fn is_absolute_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    url.is_empty()
        || url.starts_with('/')
        || url.starts_with('#')
        || lower.starts_with("data:")
        || lower.starts_with("http:")
        || lower.starts_with("https:")
}

impl Stage for RebaseUrls {
    fn name(&self) -> &'static str {
        "rebase-urls"
    }

    fn apply<'a>(&'a self, assets: Vec<Asset>) -> StageFuture<'a> {
        let result: StageResult = assets
            .into_iter()
            .map(|mut asset| -> Result<Asset, StageError> {
                let rebased = self.rebase(asset.text(self.name())?);
                asset.contents = rebased.into_bytes();
                Ok(asset)
            })
            .collect();
        ready(result)
    }
}

/// Vendor prefixing for the target browsers, minified in production.
#[derive(Debug, Clone)]
pub struct Prefix {
    browsers: Option<Browsers>,
    minify: bool,
}

impl Prefix {
    pub fn new(browsers: Option<Browsers>, minify: bool) -> Self {
        Self { browsers, minify }
    }

    pub fn process(&self, asset: &Asset) -> Result<String, StageError> {
        let fail = |message: String| StageError::new(PREFIX, &asset.source, message);
        let css = asset.text(PREFIX)?;

        let targets = Targets {
            browsers: self.browsers,
            ..Targets::default()
        };

        let mut sheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| fail(e.to_string()))?;
        sheet
            .minify(MinifyOptions {
                targets,
                ..MinifyOptions::default()
            })
            .map_err(|e| fail(e.to_string()))?;
        let printed = sheet
            .to_css(PrinterOptions {
                minify: self.minify,
                targets,
                ..PrinterOptions::default()
            })
            .map_err(|e| fail(e.to_string()))?;
        Ok(printed.code)
    }
}

impl Stage for Prefix {
    fn name(&self) -> &'static str {
        PREFIX
    }

    fn apply<'a>(&'a self, assets: Vec<Asset>) -> StageFuture<'a> {
        let result: StageResult = assets
            .into_iter()
            .map(|mut asset| -> Result<Asset, StageError> {
                let before = asset.contents.len();
                asset.contents = self.process(&asset)?.into_bytes();
                if self.minify {
                    log_size(PREFIX, &asset, before);
                }
                Ok(asset)
            })
            .collect();
        ready(result)
    }
}
