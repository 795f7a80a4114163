// src/pipeline/stages/mod.rs

//! Default stage implementations.
//!
//! The heavy lifting is delegated: `minify-html` for HTML and JavaScript,
//! `image` for re-encoding, `lightningcss` for prefixing and CSS
//! minification, and an external compiler process for Sass.

pub mod html;
pub mod images;
pub mod scripts;
pub mod styles;

use tracing::info;

use super::{Asset, Stage, StageFuture, ready};

/// Pass-through: outputs are byte-identical copies of the inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Copy;

impl Stage for Copy {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn apply<'a>(&'a self, assets: Vec<Asset>) -> StageFuture<'a> {
        ready(Ok(assets))
    }
}

/// Report the size change of a minifying stage.
pub(crate) fn log_size(stage: &'static str, asset: &Asset, before: usize) {
    info!(
        stage,
        path = %asset.rel.display(),
        before,
        after = asset.contents.len(),
        "size"
    );
}
