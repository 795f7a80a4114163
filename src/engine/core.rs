// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of commands describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - sending `ScheduledTask`s to the executor
//! - starting the watcher and pushing reload messages
//!
//! The core is unit tested without any Tokio, channels, filesystem, or
//! processes.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::engine::queue::RebuildQueue;
use crate::engine::{
    RuntimeEvent, RuntimeOptions, ScheduledTask, TaskName, TaskOutcome, TriggerReason,
};
use crate::reload::{ReloadMessage, ReloadPolicy};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Broadcast to live-reload clients.
    NotifyReload(ReloadMessage),
    /// The initial build is done; start file watching.
    StartWatching,
    /// The run is over.
    RequestExit { success: bool },
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Watch-mode lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Initial build in progress; nothing is watched yet.
    Idle,
    /// Waiting for changes.
    Watching,
    /// At least one rebuild is in flight.
    Rebuilding,
    /// Shut down; subscriptions released.
    Stopped,
}

#[derive(Debug)]
pub struct CoreRuntime {
    state: WatchState,
    queue: RebuildQueue,
    initial: Vec<TaskName>,
    pending_initial: BTreeSet<TaskName>,
    initial_failures: usize,
    reload: ReloadPolicy,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(initial: Vec<TaskName>, reload: ReloadPolicy, options: RuntimeOptions) -> Self {
        Self {
            state: WatchState::Idle,
            queue: RebuildQueue::new(),
            pending_initial: initial.iter().cloned().collect(),
            initial,
            initial_failures: 0,
            reload,
            options,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Expose queue idleness (for tests).
    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    /// True unless a task of the initial build failed.
    pub fn succeeded(&self) -> bool {
        self.initial_failures == 0
    }

    /// Kick off the initial build.
    pub fn start(&mut self) -> CoreStep {
        let mut ready = Vec::new();
        for task in &self.initial {
            if self.queue.request(task) {
                ready.push(ScheduledTask::new(task.clone(), TriggerReason::Initial));
            }
        }
        info!(tasks = ?self.initial, "starting initial build");

        if ready.is_empty() {
            return self.finish_initial_build(Vec::new());
        }
        CoreStep::running(vec![CoreCommand::DispatchTasks(ready)])
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskTriggered { task, reason } => self.on_trigger(task, reason),
            RuntimeEvent::TaskCompleted { task, outcome } => self.on_completion(task, outcome),
            RuntimeEvent::ShutdownRequested => {
                info!("shutdown requested");
                self.state = WatchState::Stopped;
                CoreStep {
                    commands: Vec::new(),
                    keep_running: false,
                }
            }
        }
    }

    fn on_trigger(&mut self, task: TaskName, reason: TriggerReason) -> CoreStep {
        if self.state == WatchState::Stopped {
            return CoreStep::running(Vec::new());
        }

        let mut commands = Vec::new();
        if self.queue.request(&task) {
            debug!(task = %task, ?reason, "dispatching rebuild");
            commands.push(CoreCommand::DispatchTasks(vec![ScheduledTask::new(task, reason)]));
        }
        self.refresh_watch_state();
        CoreStep::running(commands)
    }

    fn on_completion(&mut self, task: TaskName, outcome: TaskOutcome) -> CoreStep {
        let mut commands = Vec::new();
        let follow_up = self.queue.complete(&task);
        let was_initial = self.pending_initial.remove(&task);

        match &outcome {
            TaskOutcome::Success(report) => {
                if self.is_watching() {
                    if let Some(message) = self.reload.message_for(&task, report) {
                        commands.push(CoreCommand::NotifyReload(message));
                    }
                }
            }
            TaskOutcome::Failed(reason) => {
                warn!(task = %task, reason = %reason, "task failed");
                if was_initial {
                    self.initial_failures += 1;
                }
            }
        }

        if follow_up {
            commands.push(CoreCommand::DispatchTasks(vec![ScheduledTask::new(
                task,
                TriggerReason::FollowUp,
            )]));
        }

        if was_initial && self.pending_initial.is_empty() && self.state == WatchState::Idle {
            return self.finish_initial_build(commands);
        }

        self.refresh_watch_state();
        CoreStep::running(commands)
    }

    fn finish_initial_build(&mut self, mut commands: Vec<CoreCommand>) -> CoreStep {
        let success = self.succeeded();
        if self.options.watch {
            info!(success, "initial build complete; watching for changes");
            self.state = WatchState::Watching;
            self.refresh_watch_state();
            commands.push(CoreCommand::StartWatching);
            CoreStep::running(commands)
        } else {
            info!(success, "build complete");
            self.state = WatchState::Stopped;
            commands.push(CoreCommand::RequestExit { success });
            CoreStep {
                commands,
                keep_running: false,
            }
        }
    }

    fn is_watching(&self) -> bool {
        matches!(self.state, WatchState::Watching | WatchState::Rebuilding)
    }

    fn refresh_watch_state(&mut self) {
        if self.is_watching() {
            self.state = if self.queue.is_idle() {
                WatchState::Watching
            } else {
                WatchState::Rebuilding
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TaskReport;
    use crate::reload::ReloadStyle;
    use std::path::PathBuf;

    fn policy() -> ReloadPolicy {
        ReloadPolicy::new("/p/build")
            .with_task("html", ReloadStyle::FullReload)
            .with_task("sass", ReloadStyle::Inject)
            .with_task("js", ReloadStyle::FullReload)
    }

    fn core(initial: &[&str], watch: bool) -> CoreRuntime {
        CoreRuntime::new(
            initial.iter().map(|s| s.to_string()).collect(),
            policy(),
            RuntimeOptions { watch },
        )
    }

    fn done(task: &str, written: &[&str]) -> RuntimeEvent {
        RuntimeEvent::TaskCompleted {
            task: task.to_string(),
            outcome: TaskOutcome::Success(TaskReport {
                ran: vec![task.to_string()],
                written: written.iter().map(PathBuf::from).collect(),
            }),
        }
    }

    fn trigger(task: &str) -> RuntimeEvent {
        RuntimeEvent::TaskTriggered {
            task: task.to_string(),
            reason: TriggerReason::FileWatch,
        }
    }

    fn dispatched(step: &CoreStep) -> Vec<String> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::DispatchTasks(tasks) => Some(tasks),
                _ => None,
            })
            .flatten()
            .map(|t| t.name.clone())
            .collect()
    }

    #[test]
    fn watching_starts_only_after_every_initial_task() {
        let mut core = core(&["html", "sass"], true);
        let step = core.start();
        assert_eq!(dispatched(&step), vec!["html", "sass"]);
        assert_eq!(core.state(), WatchState::Idle);

        let step = core.step(done("html", &["/p/build/index.html"]));
        assert!(!step.commands.contains(&CoreCommand::StartWatching));
        assert_eq!(core.state(), WatchState::Idle);

        let step = core.step(done("sass", &[]));
        assert!(step.commands.contains(&CoreCommand::StartWatching));
        assert_eq!(core.state(), WatchState::Watching);
    }

    #[test]
    fn no_reload_during_initial_build() {
        let mut core = core(&["html"], true);
        core.start();
        let step = core.step(done("html", &["/p/build/index.html"]));
        assert!(
            !step
                .commands
                .iter()
                .any(|c| matches!(c, CoreCommand::NotifyReload(_)))
        );
    }

    #[test]
    fn once_mode_exits_with_failure_status() {
        let mut core = core(&["html", "images"], false);
        core.start();
        core.step(RuntimeEvent::TaskCompleted {
            task: "html".into(),
            outcome: TaskOutcome::Failed("bad template".into()),
        });
        let step = core.step(done("images", &[]));
        assert!(!step.keep_running);
        assert!(step
            .commands
            .contains(&CoreCommand::RequestExit { success: false }));
    }

    #[test]
    fn change_during_rebuild_schedules_one_follow_up() {
        let mut core = core(&["sass"], true);
        core.start();
        core.step(done("sass", &[]));

        let step = core.step(trigger("sass"));
        assert_eq!(dispatched(&step), vec!["sass"]);
        assert_eq!(core.state(), WatchState::Rebuilding);

        assert!(dispatched(&core.step(trigger("sass"))).is_empty());
        assert!(dispatched(&core.step(trigger("sass"))).is_empty());

        let step = core.step(done("sass", &["/p/build/css/main.css"]));
        assert_eq!(dispatched(&step), vec!["sass"]);
        assert_eq!(core.state(), WatchState::Rebuilding);

        let step = core.step(done("sass", &[]));
        assert!(dispatched(&step).is_empty());
        assert_eq!(core.state(), WatchState::Watching);
    }

    #[test]
    fn stylesheet_rebuild_injects_relative_paths() {
        let mut core = core(&["sass"], true);
        core.start();
        core.step(done("sass", &[]));
        core.step(trigger("sass"));

        let step = core.step(done(
            "sass",
            &["/p/src/scss/images/_datauri.scss", "/p/build/css/main.css"],
        ));
        assert!(step.commands.contains(&CoreCommand::NotifyReload(
            ReloadMessage::Inject {
                paths: vec!["css/main.css".into()]
            }
        )));
    }

    #[test]
    fn nothing_written_means_no_reload() {
        let mut core = core(&["js"], true);
        core.start();
        core.step(done("js", &[]));
        core.step(trigger("js"));
        let step = core.step(done("js", &[]));
        assert!(step.commands.is_empty());
    }

    #[test]
    fn shutdown_stops_the_loop_and_ignores_later_triggers() {
        let mut core = core(&["js"], true);
        core.start();
        let step = core.step(RuntimeEvent::ShutdownRequested);
        assert!(!step.keep_running);
        assert_eq!(core.state(), WatchState::Stopped);
        assert!(core.step(trigger("html")).commands.is_empty());
    }
}
