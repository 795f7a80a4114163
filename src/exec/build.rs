// src/exec/build.rs

//! One class build: discover, filter, transform, write.

use std::path::PathBuf;

use tracing::{debug, error, info};

use crate::errors::{AssetdagError, Result};
use crate::fs::glob::{collect_matching, collect_all, glob_base};
use crate::incremental::{newest_mtime, select_stale};
use crate::pipeline::{Asset, OutputPolicy};
use crate::types::AssetKind;

use super::task_runner::TaskContext;

/// Build one asset class and return the files written.
///
/// Only inputs newer than their outputs are read. If any stage fails,
/// nothing from this batch is written and existing outputs stay as they
/// were.
pub async fn build_class(ctx: &TaskContext, kind: AssetKind) -> Result<Vec<PathBuf>> {
    let cfg = &ctx.config;
    let class = cfg
        .class(kind)
        .ok_or_else(|| AssetdagError::TaskNotFound(kind.task_name().to_string()))?;
    let pipeline = ctx
        .pipelines
        .get(kind)
        .ok_or_else(|| AssetdagError::TaskNotFound(class.name.clone()))?;

    let fs = ctx.fs.as_ref();
    let root = cfg.root();
    let input_base = root.join(glob_base(&class.input));
    let output_dir = cfg.output_dir(class);

    let sources: Vec<PathBuf> = collect_matching(fs, root, &class.input)?
        .into_iter()
        .filter(|p| pipeline.accepts(p))
        .collect();
    if sources.is_empty() {
        debug!(class = %kind, pattern = %class.input, "no inputs; nothing to build");
        return Ok(Vec::new());
    }

    let extras = collect_all(fs, root, &class.extra_deps)?;
    let extra_newest = newest_mtime(fs, &extras)?;
    let stale = select_stale(
        fs,
        &sources,
        &input_base,
        &output_dir,
        &pipeline.freshness,
        extra_newest,
    )?;
    if stale.is_empty() {
        info!(class = %kind, inputs = sources.len(), "up to date");
        return Ok(Vec::new());
    }

    let mut assets = Vec::with_capacity(stale.len());
    for path in &stale {
        let rel = path.strip_prefix(&input_base).unwrap_or(path).to_path_buf();
        assets.push(Asset::new(path.clone(), rel, fs.read(path)?));
    }
    info!(class = %kind, stale = assets.len(), total = sources.len(), "building");

    let outputs = pipeline.run(assets).await.map_err(|err| {
        error!(class = %kind, stage = err.stage, path = ?err.path, "{}", err.message);
        AssetdagError::Transform(err)
    })?;

    if pipeline.output_policy == OutputPolicy::Replace {
        debug!(dir = ?output_dir, "replacing output directory");
        fs.remove_dir_all(&output_dir)?;
    }

    let mut written = Vec::with_capacity(outputs.len());
    for asset in outputs {
        let target = output_dir.join(&asset.rel);
        fs.write(&target, &asset.contents)?;
        debug!(path = ?target, bytes = asset.contents.len(), "wrote output");
        written.push(target);
    }
    info!(class = %kind, written = written.len(), "class built");
    Ok(written)
}
