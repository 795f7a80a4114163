// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{RuntimeEvent, TriggerReason, WatchLauncher};
use crate::watch::path_utils::{is_relevant, is_temp_file, relative_str};
use crate::watch::patterns::TaskWatchProfile;

/// Events arriving within this window are coalesced into one trigger per task.
const DEBOUNCE_MS: u64 = 100;

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher over the profiles' base directories and send
/// `RuntimeEvent::TaskTriggered` for every task whose globs match a changed
/// path.
///
/// - `root` is the project root against which all glob patterns are evaluated.
/// - `generated` lists root-relative directories the build itself writes
///   into; changes there never trigger.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    profiles: Vec<TaskWatchProfile>,
    generated: Vec<String>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("assetdag: failed to forward notify event: {err}");
                }
            }
            Err(err) => eprintln!("assetdag: file watch error: {err}"),
        },
        Config::default(),
    )?;

    for dir in watch_roots(&root, &profiles) {
        watcher.watch(&dir, RecursiveMode::Recursive)?;
        info!(dir = ?dir, "watching");
    }

    let profiles = Arc::new(profiles);
    tokio::spawn(async move {
        while let Some(first) = event_rx.recv().await {
            let mut pending = BTreeSet::new();
            collect_tasks(&root, &profiles, &generated, first, &mut pending);

            let window = tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS));
            tokio::pin!(window);
            loop {
                tokio::select! {
                    Some(event) = event_rx.recv() => {
                        collect_tasks(&root, &profiles, &generated, event, &mut pending);
                    }
                    _ = &mut window => break,
                }
            }

            for task in pending {
                info!(task = %task, "change detected");
                let event = RuntimeEvent::TaskTriggered {
                    task,
                    reason: TriggerReason::FileWatch,
                };
                if runtime_tx.send(event).await.is_err() {
                    debug!("runtime gone; stopping watcher loop");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

/// Existing base directories, with nested ones folded into their parents.
fn watch_roots(root: &Path, profiles: &[TaskWatchProfile]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = profiles
        .iter()
        .flat_map(|p| p.bases())
        .map(|base| root.join(base))
        .filter(|dir| {
            let exists = dir.is_dir();
            if !exists {
                warn!(dir = ?dir, "watch directory does not exist; skipping");
            }
            exists
        })
        .collect();
    dirs.sort();
    dirs.dedup();

    let mut roots: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        if !roots.iter().any(|r| dir.starts_with(r)) {
            roots.push(dir);
        }
    }
    roots
}

fn collect_tasks(
    root: &Path,
    profiles: &[TaskWatchProfile],
    generated: &[String],
    event: Event,
    pending: &mut BTreeSet<String>,
) {
    if !is_relevant(&event.kind) {
        return;
    }
    for path in &event.paths {
        if is_temp_file(path) {
            continue;
        }
        let Some(rel) = relative_str(root, path) else {
            warn!(path = ?path, root = ?root, "could not relativize event path");
            continue;
        };
        if generated
            .iter()
            .any(|dir| rel.starts_with(&format!("{dir}/")))
        {
            continue;
        }
        for profile in profiles.iter().filter(|p| p.matches(&rel)) {
            debug!(path = %rel, task = profile.name(), "watched path changed");
            pending.insert(profile.name().to_string());
        }
    }
}

/// Starts [`spawn_watcher`] when the runtime enters watch mode.
pub struct NotifyLauncher {
    root: PathBuf,
    profiles: Vec<TaskWatchProfile>,
    generated: Vec<String>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    handle: Option<WatcherHandle>,
}

impl NotifyLauncher {
    pub fn new(
        root: impl Into<PathBuf>,
        profiles: Vec<TaskWatchProfile>,
        generated: Vec<String>,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        Self {
            root: root.into(),
            profiles,
            generated,
            runtime_tx,
            handle: None,
        }
    }
}

impl WatchLauncher for NotifyLauncher {
    fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        let handle = spawn_watcher(
            self.root.clone(),
            self.profiles.clone(),
            self.generated.clone(),
            self.runtime_tx.clone(),
        )?;
        self.handle = Some(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, EventKind, RemoveKind};

    fn profiles() -> Vec<TaskWatchProfile> {
        vec![
            TaskWatchProfile::new("sass", vec!["src/scss/**/*".into()]).unwrap(),
            TaskWatchProfile::new("js", vec!["src/js/**/*".into()]).unwrap(),
        ]
    }

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn matching_create_is_collected() {
        let mut pending = BTreeSet::new();
        collect_tasks(
            Path::new("/p"),
            &profiles(),
            &[],
            event(EventKind::Create(CreateKind::File), "/p/src/scss/main.scss"),
            &mut pending,
        );
        assert_eq!(pending.into_iter().collect::<Vec<_>>(), vec!["sass"]);
    }

    #[test]
    fn removals_temp_files_and_generated_output_are_skipped() {
        let mut pending = BTreeSet::new();
        let generated = vec!["src/scss/images".to_string()];
        for ev in [
            event(EventKind::Remove(RemoveKind::File), "/p/src/scss/main.scss"),
            event(EventKind::Create(CreateKind::File), "/p/src/js/.app.js.swp"),
            event(EventKind::Create(CreateKind::File), "/p/src/scss/images/_datauri.scss"),
        ] {
            collect_tasks(Path::new("/p"), &profiles(), &generated, ev, &mut pending);
        }
        assert!(pending.is_empty());
    }

    #[test]
    fn nested_bases_are_folded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/template")).unwrap();
        let profiles = vec![
            TaskWatchProfile::new("html", vec!["src/*.html".into(), "src/template/**/*".into()])
                .unwrap(),
        ];
        assert_eq!(watch_roots(dir.path(), &profiles), vec![dir.path().join("src")]);
    }
}
