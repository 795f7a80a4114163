// src/errors.rs

//! Crate-wide error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A transformation stage rejected one of its inputs.
///
/// Carries enough context to point a developer at the offending file
/// without rerunning anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub stage: &'static str,
    pub path: PathBuf,
    pub message: String,
}

impl StageError {
    pub fn new(stage: &'static str, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            stage,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stage '{}' failed on {}: {}",
            self.stage,
            self.path.display(),
            self.message
        )
    }
}

impl std::error::Error for StageError {}

#[derive(Error, Debug)]
pub enum AssetdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Transformation error: {0}")]
    Transform(#[from] StageError),

    #[error("Task '{task}' failed: {reason}")]
    TaskFailed { task: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetdagError>;
