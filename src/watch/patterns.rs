// src/watch/patterns.rs

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use globset::GlobSet;

use crate::config::model::ConfigFile;
use crate::engine::TaskName;
use crate::fs::glob::{compile_set, glob_base};

/// Compiled watch globs for a single task.
///
/// The patterns are relative to the project root. The watcher passes
/// relative paths (e.g. `"src/scss/main.scss"`) into `matches`.
#[derive(Clone)]
pub struct TaskWatchProfile {
    name: TaskName,
    patterns: Vec<String>,
    watch_set: GlobSet,
}

impl fmt::Debug for TaskWatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskWatchProfile")
            .field("name", &self.name)
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl TaskWatchProfile {
    pub fn new(name: impl Into<TaskName>, patterns: Vec<String>) -> Result<Self> {
        let name = name.into();
        let watch_set = compile_set(&patterns)
            .with_context(|| format!("building watch globset for task {name}"))?;
        Ok(Self {
            name,
            patterns,
            watch_set,
        })
    }

    /// Name of the task this profile triggers.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.watch_set.is_match(rel_path)
    }

    /// Root-relative directories that must be watched to see every match.
    pub fn bases(&self) -> Vec<PathBuf> {
        self.patterns.iter().map(|p| glob_base(p)).collect()
    }
}

/// One profile per `default` dependency that is an asset class.
pub fn build_profiles_from_config(cfg: &ConfigFile) -> Result<Vec<TaskWatchProfile>> {
    cfg.default_tasks()
        .iter()
        .filter_map(|task| cfg.class_by_task(task))
        .map(|class| TaskWatchProfile::new(class.name.clone(), class.watch.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::RawConfigFile;

    fn profiles() -> Vec<TaskWatchProfile> {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        build_profiles_from_config(&cfg).unwrap()
    }

    fn triggered(rel: &str) -> Vec<String> {
        profiles()
            .iter()
            .filter(|p| p.matches(rel))
            .map(|p| p.name().to_string())
            .collect()
    }

    #[test]
    fn one_profile_per_default_task() {
        let names: Vec<String> = profiles().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["html", "images", "fonts", "sass", "js"]);
    }

    #[test]
    fn stylesheet_change_only_triggers_sass() {
        assert_eq!(triggered("src/scss/main.scss"), vec!["sass"]);
        assert_eq!(triggered("src/scss/partials/_grid.scss"), vec!["sass"]);
    }

    #[test]
    fn inline_images_trigger_sass_not_images() {
        assert_eq!(triggered("src/images/inline/icon.png"), vec!["sass"]);
        assert_eq!(triggered("src/images/logo.png"), vec!["images"]);
    }

    #[test]
    fn templates_trigger_html() {
        assert_eq!(triggered("src/template/head.html"), vec!["html"]);
        assert_eq!(triggered("src/index.html"), vec!["html"]);
    }
}
