// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::ScheduledTask;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::reload::ReloadSink;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Starts file watching once the initial build is done.
///
/// Production uses the `notify`-backed launcher in [`crate::watch`]; tests
/// pass nothing or a stub.
pub trait WatchLauncher: Send {
    fn start(&mut self) -> anyhow::Result<()>;
}

/// Drives the core state machine in response to `RuntimeEvent`s and
/// delegates builds to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from
/// channels, dispatching tasks, pushing reload messages and starting the
/// watcher.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    reload: Arc<dyn ReloadSink>,
    watcher: Option<Box<dyn WatchLauncher>>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        reload: Arc<dyn ReloadSink>,
        watcher: Option<Box<dyn WatchLauncher>>,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            reload,
            watcher,
        }
    }

    /// Main event loop.
    ///
    /// - Starts the initial build.
    /// - Consumes `RuntimeEvent`s from `event_rx` and feeds them to the core.
    /// - Executes the commands the core returns.
    ///
    /// Returns whether the initial build succeeded.
    pub async fn run(mut self) -> Result<bool> {
        info!("assetdag runtime started");

        let step = self.core.start();
        let mut keep_running = step.keep_running;
        for command in step.commands {
            self.execute_command(command).await?;
        }

        while keep_running {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                keep_running = false;
            }
        }

        info!(state = ?self.core.state(), "runtime exiting");
        Ok(self.core.succeeded())
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => {
                self.spawn_ready(tasks).await?;
            }
            CoreCommand::NotifyReload(message) => {
                self.reload.notify(&message);
            }
            CoreCommand::StartWatching => {
                if let Some(watcher) = self.watcher.as_mut() {
                    watcher.start()?;
                }
            }
            CoreCommand::RequestExit { success } => {
                info!(success, "core issued RequestExit command");
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, "dispatching tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}
