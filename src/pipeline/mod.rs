// src/pipeline/mod.rs

//! Per-class transformation pipelines.
//!
//! A pipeline is an ordered list of [`Stage`]s. Each stage takes the whole
//! batch of in-memory [`Asset`]s and returns the transformed batch, so
//! one-to-one stages (compile, minify) and many-to-one stages (concatenate,
//! stylesheet fragment) share one contract.
//!
//! Which stages a class gets is decided once per process by [`stage_plan`],
//! a table keyed on (class, mode). Execution never branches on the mode.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::config::model::{AssetClass, ClassOptions, ConfigFile, ProjectInfo};
use crate::errors::{AssetdagError, Result, StageError};
use crate::fs::FileSystem;
use crate::incremental::Freshness;
use crate::mode::BuildMode;
use crate::types::AssetKind;

pub mod stages;

/// One file flowing through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Absolute path of the input this asset came from. Used in errors.
    pub source: PathBuf,
    /// Destination, relative to the class's output directory.
    pub rel: PathBuf,
    pub contents: Vec<u8>,
}

impl Asset {
    pub fn new(source: impl Into<PathBuf>, rel: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            source: source.into(),
            rel: rel.into(),
            contents: contents.into(),
        }
    }

    /// Contents as UTF-8, or a stage error naming this asset.
    pub fn text(&self, stage: &'static str) -> std::result::Result<&str, StageError> {
        std::str::from_utf8(&self.contents)
            .map_err(|e| StageError::new(stage, &self.source, format!("not valid UTF-8: {e}")))
    }
}

pub type StageResult = std::result::Result<Vec<Asset>, StageError>;
pub type StageFuture<'a> = Pin<Box<dyn Future<Output = StageResult> + Send + 'a>>;

/// A single transformation step.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply<'a>(&'a self, assets: Vec<Asset>) -> StageFuture<'a>;
}

/// Wrap a synchronous stage result.
pub(crate) fn ready<'a>(result: StageResult) -> StageFuture<'a> {
    Box::pin(std::future::ready(result))
}

/// How a class's outputs land in its output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPolicy {
    /// Write each output next to whatever is already there.
    Merge,
    /// Clear the output directory first.
    Replace,
}

/// Identifiers for the stages a plan can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageId {
    Preprocess,
    MinifyHtml,
    Compress,
    DataUri,
    Fragment,
    Compile,
    RebaseUrls,
    Prefix,
    Concat,
    MinifyJs,
    Copy,
}

/// The (class, mode) → stages table.
pub fn stage_plan(kind: AssetKind, mode: BuildMode) -> &'static [StageId] {
    use StageId::*;
    match (kind, mode) {
        (AssetKind::Html, BuildMode::Development) => &[Preprocess],
        (AssetKind::Html, BuildMode::Production) => &[Preprocess, MinifyHtml],
        (AssetKind::Images, _) => &[Compress],
        (AssetKind::InlineImages, _) => &[Compress, DataUri, Fragment],
        (AssetKind::Styles, _) => &[Compile, RebaseUrls, Prefix],
        (AssetKind::Scripts, BuildMode::Development) => &[Copy],
        (AssetKind::Scripts, BuildMode::Production) => &[Concat, MinifyJs],
        (AssetKind::Fonts, _) => &[Copy],
    }
}

/// A composed pipeline for one class in one mode.
pub struct Pipeline {
    pub kind: AssetKind,
    pub mode: BuildMode,
    pub freshness: Freshness,
    pub output_policy: OutputPolicy,
    /// Drop `_`-prefixed inputs (Sass partials) before building.
    pub skip_partials: bool,
    stages: Vec<Box<dyn Stage>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Whether an input path takes part in this class's build.
    pub fn accepts(&self, path: &Path) -> bool {
        if !self.skip_partials {
            return true;
        }
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| !n.starts_with('_'))
            .unwrap_or(false)
    }

    /// Run every stage in order. The first failure aborts the batch.
    pub async fn run(&self, mut assets: Vec<Asset>) -> StageResult {
        for stage in &self.stages {
            debug!(class = %self.kind, stage = stage.name(), assets = assets.len(), "running stage");
            assets = stage.apply(assets).await?;
        }
        Ok(assets)
    }
}

/// Compose the pipeline for one class.
pub fn compose(
    class: &AssetClass,
    project: &ProjectInfo,
    mode: BuildMode,
    fs: Arc<dyn FileSystem>,
) -> Result<Pipeline> {
    let mut stages: Vec<Box<dyn Stage>> = Vec::new();
    for id in stage_plan(class.kind, mode) {
        stages.push(build_stage(*id, class, project, mode, Arc::clone(&fs))?);
    }

    let (freshness, output_policy) = match (&class.options, mode) {
        (ClassOptions::InlineImages { filename, .. }, _) => (
            Freshness::Aggregate {
                output: filename.clone(),
            },
            OutputPolicy::Merge,
        ),
        (ClassOptions::Scripts { bundle }, BuildMode::Production) => (
            Freshness::Aggregate {
                output: bundle.clone(),
            },
            OutputPolicy::Replace,
        ),
        (ClassOptions::Styles { .. }, _) => (
            Freshness::PerFile {
                extension: Some("css".to_string()),
            },
            OutputPolicy::Merge,
        ),
        _ => (Freshness::PerFile { extension: None }, OutputPolicy::Merge),
    };

    Ok(Pipeline {
        kind: class.kind,
        mode,
        freshness,
        output_policy,
        skip_partials: class.kind == AssetKind::Styles,
        stages,
    })
}

fn build_stage(
    id: StageId,
    class: &AssetClass,
    project: &ProjectInfo,
    mode: BuildMode,
    fs: Arc<dyn FileSystem>,
) -> Result<Box<dyn Stage>> {
    use stages::{html, images, scripts, styles};

    let stage: Box<dyn Stage> = match (id, &class.options) {
        (StageId::Preprocess, ClassOptions::Html { context }) => {
            Box::new(html::Preprocess::new(html::template_context(project, mode, context), fs))
        }
        (StageId::MinifyHtml, _) => Box::new(html::MinifyHtml),
        (StageId::Compress, ClassOptions::Images { jpeg_quality })
        | (StageId::Compress, ClassOptions::InlineImages { jpeg_quality, .. }) => {
            Box::new(images::Compress::new(*jpeg_quality))
        }
        (StageId::DataUri, _) => Box::new(images::DataUri),
        (StageId::Fragment, ClassOptions::InlineImages { filename, namespace, .. }) => {
            Box::new(images::StylesheetFragment::new(namespace, filename))
        }
        (StageId::Compile, ClassOptions::Styles { compiler, precision, .. }) => Box::new(
            styles::Compile::new(compiler.clone(), project.root.clone(), *precision),
        ),
        (StageId::RebaseUrls, ClassOptions::Styles { image_path, .. }) => {
            Box::new(styles::RebaseUrls::new(image_path))
        }
        (StageId::Prefix, ClassOptions::Styles { browsers, .. }) => {
            let targets = styles::browser_targets(browsers).map_err(|e| {
                AssetdagError::ConfigError(format!("[styles].browsers: {e}"))
            })?;
            Box::new(styles::Prefix::new(targets, mode.is_production()))
        }
        (StageId::Concat, ClassOptions::Scripts { bundle }) => Box::new(scripts::Concat::new(bundle)),
        (StageId::MinifyJs, _) => Box::new(scripts::MinifyJs),
        (StageId::Copy, _) => Box::new(stages::Copy),
        (id, options) => {
            return Err(AssetdagError::ConfigError(format!(
                "stage {id:?} cannot be built for {} ({options:?})",
                class.kind
            )));
        }
    };
    Ok(stage)
}

/// Pipelines for every class, composed once per process.
#[derive(Debug)]
pub struct PipelineTable {
    pipelines: BTreeMap<AssetKind, Pipeline>,
}

impl PipelineTable {
    pub fn compose(cfg: &ConfigFile, mode: BuildMode, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let mut pipelines = BTreeMap::new();
        for class in cfg.classes() {
            pipelines.insert(class.kind, compose(class, &cfg.project, mode, Arc::clone(&fs))?);
        }
        Ok(Self { pipelines })
    }

    pub fn get(&self, kind: AssetKind) -> Option<&Pipeline> {
        self.pipelines.get(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_plan_depends_on_mode() {
        assert_eq!(stage_plan(AssetKind::Scripts, BuildMode::Development), &[StageId::Copy]);
        assert_eq!(
            stage_plan(AssetKind::Scripts, BuildMode::Production),
            &[StageId::Concat, StageId::MinifyJs]
        );
    }

    #[test]
    fn inline_images_plan_is_mode_independent() {
        assert_eq!(
            stage_plan(AssetKind::InlineImages, BuildMode::Development),
            stage_plan(AssetKind::InlineImages, BuildMode::Production)
        );
    }

    #[test]
    fn html_gets_minified_only_in_production() {
        assert!(!stage_plan(AssetKind::Html, BuildMode::Development).contains(&StageId::MinifyHtml));
        assert!(stage_plan(AssetKind::Html, BuildMode::Production).contains(&StageId::MinifyHtml));
    }
}
