// src/engine/mod.rs

//! Orchestration engine for assetdag.
//!
//! This module ties together:
//! - the initial build of the requested task(s)
//! - the per-task rebuild queue (at most one run in flight per task, at
//!   most one follow-up queued behind it)
//! - the watch-mode state machine
//! - live-reload notifications after successful rebuilds
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::path::PathBuf;

pub use crate::types::TaskName;

/// Why a task was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Part of the build requested on the command line.
    Initial,
    /// A watched file changed.
    FileWatch,
    /// A change arrived while the task was running.
    FollowUp,
}

/// A task handed to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub reason: TriggerReason,
}

impl ScheduledTask {
    pub fn new(name: impl Into<TaskName>, reason: TriggerReason) -> Self {
        Self {
            name: name.into(),
            reason,
        }
    }
}

/// What a successful task run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskReport {
    /// Tasks that ran, prerequisites first.
    pub ran: Vec<TaskName>,
    /// Every file written, absolute.
    pub written: Vec<PathBuf>,
}

/// Outcome of a task run for the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success(TaskReport),
    Failed(String),
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Enter watch mode once the initial build has completed. When false the
    /// runtime exits instead (used for `--once` and non-default tasks).
    pub watch: bool,
}

/// Events flowing into the runtime from the watcher, executor and signals.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A task should be (re)built.
    TaskTriggered {
        task: TaskName,
        reason: TriggerReason,
    },
    /// A task run finished.
    TaskCompleted {
        task: TaskName,
        outcome: TaskOutcome,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod queue;
pub mod runtime;

pub use core::{CoreCommand, CoreRuntime, CoreStep, WatchState};
pub use queue::RebuildQueue;
pub use runtime::{Runtime, WatchLauncher};
