// src/incremental.rs

//! Timestamp-based up-to-date checks.
//!
//! An input is stale when it is strictly newer than its output, or when the
//! output does not exist. No manifest is kept between runs; the filesystem
//! mtimes are the only state. A touched-but-unchanged file is rebuilt.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Result;
use tracing::debug;

use crate::fs::FileSystem;

/// A path and its modification time, captured once per check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl FileRecord {
    pub fn read(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            modified: fs.modified(path)?,
        })
    }
}

/// How inputs map onto outputs for freshness purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// One output per input, mirroring the path below the input base.
    /// `extension` replaces the input's extension when set.
    PerFile { extension: Option<String> },
    /// All inputs feed a single output file inside the output directory.
    Aggregate { output: String },
}

/// Where an input's output lives.
pub fn output_path(
    source: &Path,
    input_base: &Path,
    output_dir: &Path,
    freshness: &Freshness,
) -> PathBuf {
    match freshness {
        Freshness::PerFile { extension } => {
            let rel = source.strip_prefix(input_base).unwrap_or(source);
            let rel = match extension {
                Some(ext) => rel.with_extension(ext),
                None => rel.to_path_buf(),
            };
            output_dir.join(rel)
        }
        Freshness::Aggregate { output } => output_dir.join(output),
    }
}

/// Newest modification time among `paths`, if any.
pub fn newest_mtime(fs: &dyn FileSystem, paths: &[PathBuf]) -> Result<Option<SystemTime>> {
    let mut newest = None;
    for path in paths {
        let record = FileRecord::read(fs, path)?;
        newest = Some(match newest {
            Some(t) if t >= record.modified => t,
            _ => record.modified,
        });
    }
    Ok(newest)
}

fn is_stale(fs: &dyn FileSystem, source_time: SystemTime, output: &Path) -> Result<bool> {
    if !fs.is_file(output) {
        return Ok(true);
    }
    Ok(source_time > fs.modified(output)?)
}

/// Return the subsequence of `sources` that needs rebuilding.
///
/// `extra_newest` is the newest mtime among the class's extra dependencies;
/// it raises the effective source time of every input. For aggregate
/// freshness the result is either every source or none.
pub fn select_stale(
    fs: &dyn FileSystem,
    sources: &[PathBuf],
    input_base: &Path,
    output_dir: &Path,
    freshness: &Freshness,
    extra_newest: Option<SystemTime>,
) -> Result<Vec<PathBuf>> {
    if sources.is_empty() {
        return Ok(Vec::new());
    }

    let effective = |source_time: SystemTime| match extra_newest {
        Some(extra) if extra > source_time => extra,
        _ => source_time,
    };

    match freshness {
        Freshness::Aggregate { .. } => {
            let newest = newest_mtime(fs, sources)?.unwrap_or(SystemTime::UNIX_EPOCH);
            let target = output_path(Path::new(""), input_base, output_dir, freshness);
            if is_stale(fs, effective(newest), &target)? {
                debug!(output = ?target, inputs = sources.len(), "aggregate output is stale");
                Ok(sources.to_vec())
            } else {
                Ok(Vec::new())
            }
        }
        Freshness::PerFile { .. } => {
            let mut stale = Vec::new();
            for source in sources {
                let record = FileRecord::read(fs, source)?;
                let target = output_path(source, input_base, output_dir, freshness);
                if is_stale(fs, effective(record.modified), &target)? {
                    stale.push(record.path);
                }
            }
            Ok(stale)
        }
    }
}
