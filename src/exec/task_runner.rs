// src/exec/task_runner.rs

//! Running a named task with its prerequisites.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::model::ConfigFile;
use crate::dag::{TaskAction, TaskGraph};
use crate::engine::{RuntimeEvent, ScheduledTask, TaskOutcome, TaskReport};
use crate::errors::{AssetdagError, Result};
use crate::fs::FileSystem;
use crate::mode::BuildMode;
use crate::pipeline::PipelineTable;

use super::build::build_class;

/// Everything a task run needs, shared across concurrent runs.
#[derive(Debug)]
pub struct TaskContext {
    pub config: Arc<ConfigFile>,
    pub mode: BuildMode,
    pub fs: Arc<dyn FileSystem>,
    pub graph: TaskGraph,
    pub pipelines: PipelineTable,
}

impl TaskContext {
    pub fn new(config: Arc<ConfigFile>, mode: BuildMode, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let graph = TaskGraph::from_config(&config)?;
        let pipelines = PipelineTable::compose(&config, mode, Arc::clone(&fs))?;
        Ok(Self {
            config,
            mode,
            fs,
            graph,
            pipelines,
        })
    }
}

/// Run `name` after its prerequisites.
///
/// Prerequisites run in dependency order. A task whose prerequisite failed
/// is skipped, and tasks not depending on the failure still run. The result
/// is an error if anything failed.
pub async fn run_task(ctx: &TaskContext, name: &str) -> Result<TaskReport> {
    let order = ctx.graph.run_order(name)?;
    let mut report = TaskReport::default();
    let mut failed: BTreeSet<String> = BTreeSet::new();
    let mut first_error: Option<String> = None;

    for task in &order {
        if let Some(dep) = ctx
            .graph
            .dependencies_of(task)
            .iter()
            .find(|d| failed.contains(*d))
        {
            warn!(task = %task, failed_dependency = %dep, "skipping task");
            failed.insert(task.clone());
            continue;
        }

        match run_single(ctx, task).await {
            Ok(written) => {
                report.ran.push(task.clone());
                report.written.extend(written);
            }
            Err(err) => {
                error!(task = %task, error = %err, "task failed");
                failed.insert(task.clone());
                first_error.get_or_insert_with(|| format!("{task}: {err}"));
            }
        }
    }

    match first_error {
        Some(reason) => Err(AssetdagError::TaskFailed {
            task: name.to_string(),
            reason,
        }),
        None => Ok(report),
    }
}

async fn run_single(ctx: &TaskContext, name: &str) -> Result<Vec<std::path::PathBuf>> {
    let spec = ctx.graph.resolve(name)?;
    match spec.action {
        TaskAction::Clean => {
            let dest = ctx.config.project.dest_dir();
            info!(dir = ?dest, "cleaning output directory");
            ctx.fs.remove_dir_all(&dest)?;
            Ok(Vec::new())
        }
        TaskAction::Build(kind) => build_class(ctx, kind).await,
        TaskAction::Group => Ok(Vec::new()),
    }
}

/// Run a scheduled task and report its completion to the runtime.
pub async fn execute_scheduled(
    ctx: Arc<TaskContext>,
    task: ScheduledTask,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    info!(task = %task.name, reason = ?task.reason, "starting task");
    let outcome = match run_task(&ctx, &task.name).await {
        Ok(report) => {
            info!(task = %task.name, written = report.written.len(), "task finished");
            TaskOutcome::Success(report)
        }
        Err(err) => TaskOutcome::Failed(err.to_string()),
    };

    if let Err(err) = runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: task.name,
            outcome,
        })
        .await
    {
        error!(error = %err, "failed to report task completion");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::RawConfigFile;
    use crate::fs::mock::MockFileSystem;
    use std::path::{Path, PathBuf};

    fn context(fs: &MockFileSystem) -> TaskContext {
        let cfg = ConfigFile::try_from(RawConfigFile::default())
            .unwrap()
            .with_root("/p");
        TaskContext::new(Arc::new(cfg), BuildMode::Development, Arc::new(fs.clone())).unwrap()
    }

    #[tokio::test]
    async fn fonts_are_copied_byte_for_byte() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/fonts/a.woff", vec![0u8, 1, 2, 3]);
        let ctx = context(&fs);

        let report = run_task(&ctx, "fonts").await.unwrap();
        assert_eq!(report.ran, vec!["fonts"]);
        assert_eq!(report.written, vec![PathBuf::from("/p/build/css/fonts/a.woff")]);
        assert_eq!(
            fs.read(Path::new("/p/build/css/fonts/a.woff")).unwrap(),
            vec![0u8, 1, 2, 3]
        );
    }

    #[tokio::test]
    async fn clean_removes_destination() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/build/index.html", "old");
        let ctx = context(&fs);

        run_task(&ctx, "clean").await.unwrap();
        assert!(!fs.exists(Path::new("/p/build/index.html")));
    }

    #[tokio::test]
    async fn unknown_task_is_an_error() {
        let fs = MockFileSystem::new();
        let ctx = context(&fs);
        let err = run_task(&ctx, "deploy").await.unwrap_err();
        assert!(matches!(err, AssetdagError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn failed_class_does_not_block_siblings_in_default() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/index.html", "<!-- @if devBuild -->unterminated");
        fs.add_file("/p/src/fonts/a.woff", "font");
        let ctx = context(&fs);

        let err = run_task(&ctx, "default").await.unwrap_err();
        assert!(matches!(err, AssetdagError::TaskFailed { .. }));
        assert!(fs.exists(Path::new("/p/build/css/fonts/a.woff")));
        assert!(!fs.exists(Path::new("/p/build/index.html")));
    }
}
