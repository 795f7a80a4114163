// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod incremental;
pub mod logging;
pub mod mode;
pub mod pipeline;
pub mod reload;
pub mod serve;
pub mod types;
pub mod watch;

use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::{ensure_source_dir, load_for_cli};
use crate::config::model::{ClassOptions, ConfigFile};
use crate::dag::TaskGraph;
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, TaskName, WatchLauncher};
use crate::exec::{RealExecutorBackend, TaskContext};
use crate::fs::{FileSystem, RealFileSystem};
use crate::mode::BuildMode;
use crate::pipeline::stage_plan;
use crate::reload::{NoReload, ReloadHub, ReloadPolicy, ReloadSink};
use crate::types::DEFAULT_TASK;
use crate::watch::{NotifyLauncher, TaskWatchProfile, build_profiles_from_config};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and mode selection
/// - task graph, pipelines and executor
/// - (optional) file watcher, dev server and live reload
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let cfg = load_for_cli(args.config.as_deref(), &cwd)?;
    let mode = mode::resolve(&cfg.project);

    let graph = TaskGraph::from_config(&cfg)?;
    let task = graph.resolve(&args.task)?.name.clone();

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    ensure_source_dir(&cfg, fs.as_ref())?;

    let watch = task == DEFAULT_TASK && !args.once;
    let profiles = if watch {
        build_profiles_from_config(&cfg)?
    } else {
        Vec::new()
    };

    if args.dry_run {
        print_dry_run(&cfg, mode, &graph, &task, &profiles)?;
        return Ok(());
    }

    let initial: Vec<TaskName> = if task == DEFAULT_TASK {
        graph.dependencies_of(DEFAULT_TASK).to_vec()
    } else {
        vec![task.clone()]
    };

    let cfg = Arc::new(cfg);
    let ctx = Arc::new(TaskContext::new(Arc::clone(&cfg), mode, Arc::clone(&fs))?);

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let executor = RealExecutorBackend::new(Arc::clone(&ctx), rt_tx.clone());

    let mut reload: Arc<dyn ReloadSink> = Arc::new(NoReload);
    let mut _server = None;
    let mut watcher: Option<Box<dyn WatchLauncher>> = None;

    if watch {
        if cfg.serve.enable {
            match ReloadHub::bind(&cfg.serve.interface, cfg.serve.reload_port) {
                Ok(hub) => reload = Arc::new(hub),
                Err(err) => warn!(error = %err, "live reload disabled"),
            }
            _server = Some(serve::start(
                &cfg.serve,
                cfg.project.dest_dir(),
                cfg.serve.reload_port,
            )?);
        }

        let generated: Vec<String> = cfg.classes().iter().map(|c| c.output.clone()).collect();
        watcher = Some(Box::new(NotifyLauncher::new(
            cfg.root().to_path_buf(),
            profiles,
            generated,
            rt_tx.clone(),
        )));
    }

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }
    drop(rt_tx);

    let core = CoreRuntime::new(initial, ReloadPolicy::from_config(&cfg), RuntimeOptions { watch });
    let runtime = Runtime::new(core, rt_rx, executor, reload, watcher);
    let success = runtime.run().await?;

    if !success {
        bail!("build failed");
    }
    info!("done");
    Ok(())
}

/// Print what would run, without touching the filesystem.
fn print_dry_run(
    cfg: &ConfigFile,
    mode: BuildMode,
    graph: &TaskGraph,
    task: &str,
    profiles: &[TaskWatchProfile],
) -> Result<()> {
    println!("assetdag dry-run");
    println!("  {}", mode::banner(&cfg.project, mode));
    println!("  root: {}", cfg.root().display());
    println!("  source: {}", cfg.project.source);
    println!("  dest: {}", cfg.project.dest);
    println!();

    println!("classes ({}):", cfg.classes().len());
    for class in cfg.classes() {
        let stages: Vec<String> = stage_plan(class.kind, mode)
            .iter()
            .map(|s| format!("{s:?}"))
            .collect();
        println!("  - {} [{}]", class.name, class.kind);
        println!("      input: {}", class.input);
        println!("      output: {}", class.output);
        println!("      stages: {}", stages.join(" -> "));
        if !class.after.is_empty() {
            println!("      after: {:?}", class.after);
        }
        if !class.extra_deps.is_empty() {
            println!("      extra_deps: {:?}", class.extra_deps);
        }
        if let ClassOptions::Styles { compiler, .. } = &class.options {
            println!("      compiler: {}", compiler.join(" "));
        }
    }
    println!();

    let order = graph.run_order(task)?;
    println!("run order for '{task}': {}", order.join(" -> "));

    if !profiles.is_empty() {
        println!();
        println!("watch:");
        for profile in profiles {
            println!("  - {}: {:?}", profile.name(), profile.patterns());
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

