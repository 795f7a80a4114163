// src/pipeline/stages/scripts.rs

//! Script bundling and minification.

use std::path::Path;

use crate::errors::StageError;
use crate::pipeline::{Asset, Stage, StageFuture, StageResult, ready};

use super::log_size;

const MINIFY_JS: &str = "minify-js";

/// Join every script, in path order, into one bundle.
#[derive(Debug, Clone)]
pub struct Concat {
    filename: String,
}

impl Concat {
    pub fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
        }
    }
}

impl Stage for Concat {
    fn name(&self) -> &'static str {
        "concat"
    }

    fn apply<'a>(&'a self, mut assets: Vec<Asset>) -> StageFuture<'a> {
        if assets.is_empty() {
            return ready(Ok(assets));
        }
        assets.sort_by(|a, b| a.rel.cmp(&b.rel));

        let mut bundle = Vec::new();
        for (idx, asset) in assets.iter().enumerate() {
            if idx > 0 {
                bundle.push(b'\n');
            }
            bundle.extend_from_slice(&asset.contents);
        }

        let source = assets[0]
            .source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        ready(Ok(vec![Asset::new(source, &self.filename, bundle)]))
    }
}

/// JavaScript minification, delegated to the script minifier embedded in
/// `minify-html`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinifyJs;

impl MinifyJs {
    pub fn minify(&self, asset: &Asset) -> Result<Vec<u8>, StageError> {
        let code = asset.text(MINIFY_JS)?;
        if code.contains("</script") {
            return Err(StageError::new(
                MINIFY_JS,
                &asset.source,
                "script contains a literal </script> sequence",
            ));
        }

        let mut cfg = minify_html::Cfg::new();
        cfg.minify_js = true;
        cfg.keep_closing_tags = true;

        let wrapped = format!("<script>{code}</script>");
        let minified = minify_html::minify(wrapped.as_bytes(), &cfg);
        let minified = String::from_utf8(minified).map_err(|e| {
            StageError::new(MINIFY_JS, &asset.source, format!("minifier produced invalid UTF-8: {e}"))
        })?;

        let body = minified
            .trim()
            .strip_prefix("<script>")
            .and_then(|rest| rest.strip_suffix("</script>"))
            .ok_or_else(|| {
                StageError::new(MINIFY_JS, &asset.source, "unexpected minifier output")
            })?;
        Ok(body.as_bytes().to_vec())
    }
}

impl Stage for MinifyJs {
    fn name(&self) -> &'static str {
        MINIFY_JS
    }

    fn apply<'a>(&'a self, assets: Vec<Asset>) -> StageFuture<'a> {
        let result: StageResult = assets
            .into_iter()
            .map(|mut asset| -> Result<Asset, StageError> {
                let before = asset.contents.len();
                asset.contents = self.minify(&asset)?;
                log_size(MINIFY_JS, &asset, before);
                Ok(asset)
            })
            .collect();
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn concat_joins_in_path_order_with_newlines() {
        let assets = vec![
            Asset::new("/p/src/js/b.js", "b.js", "var y=2;"),
            Asset::new("/p/src/js/a.js", "a.js", "var x=1;"),
        ];
        let out = Concat::new("main.js").apply(assets).await.unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rel, PathBuf::from("main.js"));
        assert_eq!(out[0].contents, b"var x=1;\nvar y=2;".to_vec());
    }

    #[tokio::test]
    async fn minified_bundle_keeps_both_statements() {
        let asset = Asset::new("/p/src/js", "main.js", "var x = 1;\n\nvar y = 2;\n");
        let out = MinifyJs.apply(vec![asset]).await.unwrap();
        let code = String::from_utf8(out[0].contents.clone()).unwrap();

        assert!(code.contains("x=1"));
        assert!(code.contains("y=2"));
        assert!(!code.contains('\n'));
    }
}
