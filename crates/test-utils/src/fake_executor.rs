use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use assetdag::engine::{RuntimeEvent, ScheduledTask, TaskOutcome, TaskReport};
use assetdag::errors::Result;
use assetdag::exec::ExecutorBackend;
use assetdag::reload::{ReloadMessage, ReloadSink};
use tokio::sync::mpsc;

/// A fake executor that:
/// - records which tasks were "run"
/// - immediately reports TaskCompleted for each scheduled task, with the
///   files registered via `with_written`, or a failure for tasks registered
///   via `failing`.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    written: HashMap<String, Vec<PathBuf>>,
    failing: Vec<String>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            runtime_tx,
            executed,
            written: HashMap::new(),
            failing: Vec::new(),
        }
    }

    pub fn with_written(mut self, task: &str, paths: &[&str]) -> Self {
        self.written
            .insert(task.to_string(), paths.iter().map(PathBuf::from).collect());
        self
    }

    pub fn failing(mut self, task: &str) -> Self {
        self.failing.push(task.to_string());
        self
    }

    fn outcome(&self, task: &str) -> TaskOutcome {
        if self.failing.iter().any(|t| t == task) {
            return TaskOutcome::Failed(format!("{task} failed"));
        }
        TaskOutcome::Success(TaskReport {
            ran: vec![task.to_string()],
            written: self.written.get(task).cloned().unwrap_or_default(),
        })
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let completions: Vec<(String, TaskOutcome)> = tasks
            .iter()
            .map(|t| (t.name.clone(), self.outcome(&t.name)))
            .collect();

        Box::pin(async move {
            for (task, outcome) in completions {
                {
                    let mut guard = executed.lock().unwrap();
                    guard.push(task.clone());
                }

                tx.send(RuntimeEvent::TaskCompleted { task, outcome })
                    .await
                    .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}

/// Reload sink that remembers every message.
#[derive(Clone, Default)]
pub struct RecordingReload {
    messages: Arc<Mutex<Vec<ReloadMessage>>>,
}

impl RecordingReload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<ReloadMessage> {
        self.messages.lock().unwrap().clone()
    }
}

impl ReloadSink for RecordingReload {
    fn notify(&self, message: &ReloadMessage) {
        self.messages.lock().unwrap().push(message.clone());
    }
}
