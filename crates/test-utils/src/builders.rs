#![allow(dead_code)]

use std::path::Path;

use assetdag::config::{ConfigFile, RawClassSection, RawConfigFile};
use assetdag::types::AssetKind;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the built-in layout (`src/` → `build/`).
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_class(mut self, kind: AssetKind, section: RawClassSection) -> Self {
        *self.config.section_mut(kind) = section;
        self
    }

    pub fn with_default_tasks(mut self, tasks: &[&str]) -> Self {
        self.config.default.tasks = Some(tasks.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn with_dirs(mut self, source: &str, dest: &str) -> Self {
        self.config.project.source = Some(source.to_string());
        self.config.project.dest = Some(dest.to_string());
        self
    }

    pub fn with_identity(mut self, name: &str, version: &str) -> Self {
        self.config.project.name = Some(name.to_string());
        self.config.project.version = Some(version.to_string());
        self
    }

    pub fn without_serve(mut self) -> Self {
        self.config.serve.enable = false;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    /// Build and anchor relative paths at `root`.
    pub fn build_at(self, root: &Path) -> ConfigFile {
        self.build().with_root(root)
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for one `[html]`/`[styles]`/... section.
#[derive(Default)]
pub struct ClassSectionBuilder {
    section: RawClassSection,
}

impl ClassSectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, pattern: &str) -> Self {
        self.section.input = Some(pattern.to_string());
        self
    }

    pub fn output(mut self, dir: &str) -> Self {
        self.section.output = Some(dir.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.section.after.get_or_insert_with(Vec::new).push(dep.to_string());
        self
    }

    pub fn watch(mut self, pattern: &str) -> Self {
        self.section.watch.get_or_insert_with(Vec::new).push(pattern.to_string());
        self
    }

    pub fn compiler(mut self, argv: &[&str]) -> Self {
        self.section.compiler = Some(argv.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn browsers(mut self, queries: &[&str]) -> Self {
        self.section.browsers = Some(queries.iter().map(|q| q.to_string()).collect());
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.section.jpeg_quality = Some(quality);
        self
    }

    pub fn build(self) -> RawClassSection {
        self.section
    }
}
