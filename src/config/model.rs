// src/config/model.rs

//! Configuration model: the Path Table.
//!
//! [`RawConfigFile`] mirrors `Assetdag.toml` one-to-one; every field is
//! optional. Validation (see `config::validate`) fills in the defaults and
//! produces a [`ConfigFile`], which is immutable for the rest of the run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::{AssetKind, TaskName};

/// `[project]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    pub name: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    /// Source root, relative to the project root. Default: `src`.
    pub source: Option<String>,
    /// Output root, relative to the project root. Default: `build`.
    pub dest: Option<String>,
    /// Where to look for name/version/author when they are not set here.
    pub package_json: Option<String>,
}

/// `[serve]` section: dev server and live reload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServeSection {
    pub enable: bool,
    pub interface: String,
    pub port: u16,
    pub reload_port: u16,
    pub index: String,
}

impl Default for ServeSection {
    fn default() -> Self {
        Self {
            enable: true,
            interface: "127.0.0.1".to_string(),
            port: 3000,
            reload_port: 35729,
            index: "index.html".to_string(),
        }
    }
}

/// `[default]` section: what the `default` task builds and watches.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DefaultSection {
    pub tasks: Option<Vec<String>>,
}

/// One asset class section (`[html]`, `[styles]`, ...).
///
/// The common fields apply to every class. The remaining options are only
/// accepted by the classes that use them; validation rejects the rest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawClassSection {
    pub input: Option<String>,
    pub output: Option<String>,
    pub watch: Option<Vec<String>>,
    pub after: Option<Vec<String>>,
    pub extra_deps: Option<Vec<String>>,

    /// html: extra template context.
    pub context: Option<BTreeMap<String, String>>,
    /// images, inline_images: JPEG re-encode quality (1-100).
    pub jpeg_quality: Option<u8>,
    /// inline_images: generated fragment name. scripts: bundle name.
    pub filename: Option<String>,
    /// inline_images: CSS class prefix.
    pub namespace: Option<String>,
    /// styles: compiler argv, source is fed on stdin.
    pub compiler: Option<Vec<String>>,
    /// styles: prefix for relative `url(...)` references.
    pub image_path: Option<String>,
    /// styles: decimal places kept in compiled output.
    pub precision: Option<u32>,
    /// styles: browserslist queries for prefixing.
    pub browsers: Option<Vec<String>>,
}

/// Top-level config as deserialised from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfigFile {
    pub project: ProjectSection,
    pub serve: ServeSection,
    pub default: DefaultSection,
    pub html: RawClassSection,
    pub images: RawClassSection,
    pub inline_images: RawClassSection,
    pub styles: RawClassSection,
    pub scripts: RawClassSection,
    pub fonts: RawClassSection,
}

impl RawConfigFile {
    pub fn section(&self, kind: AssetKind) -> &RawClassSection {
        match kind {
            AssetKind::Html => &self.html,
            AssetKind::Images => &self.images,
            AssetKind::InlineImages => &self.inline_images,
            AssetKind::Styles => &self.styles,
            AssetKind::Scripts => &self.scripts,
            AssetKind::Fonts => &self.fonts,
        }
    }

    pub fn section_mut(&mut self, kind: AssetKind) -> &mut RawClassSection {
        match kind {
            AssetKind::Html => &mut self.html,
            AssetKind::Images => &mut self.images,
            AssetKind::InlineImages => &mut self.inline_images,
            AssetKind::Styles => &mut self.styles,
            AssetKind::Scripts => &mut self.scripts,
            AssetKind::Fonts => &mut self.fonts,
        }
    }
}

/// Resolved project identity and layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub name: String,
    pub version: String,
    pub author: String,
    /// Directory all relative paths are resolved against.
    pub root: PathBuf,
    pub source: String,
    pub dest: String,
}

impl Default for ProjectInfo {
    fn default() -> Self {
        Self {
            name: "site".to_string(),
            version: "0.0.0".to_string(),
            author: String::new(),
            root: PathBuf::from("."),
            source: "src".to_string(),
            dest: "build".to_string(),
        }
    }
}

impl ProjectInfo {
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.source)
    }

    pub fn dest_dir(&self) -> PathBuf {
        self.root.join(&self.dest)
    }
}

/// Class-specific settings after defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassOptions {
    Html {
        context: BTreeMap<String, String>,
    },
    Images {
        jpeg_quality: u8,
    },
    InlineImages {
        jpeg_quality: u8,
        filename: String,
        namespace: String,
    },
    Styles {
        compiler: Vec<String>,
        image_path: String,
        precision: u32,
        browsers: Vec<String>,
    },
    Scripts {
        bundle: String,
    },
    Fonts,
}

/// One row of the Path Table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetClass {
    pub kind: AssetKind,
    /// Task name bound to this class.
    pub name: TaskName,
    /// Input glob, relative to the project root.
    pub input: String,
    /// Output directory, relative to the project root.
    pub output: String,
    /// Globs whose changes re-run this class in watch mode.
    pub watch: Vec<String>,
    /// Prerequisite tasks.
    pub after: Vec<TaskName>,
    /// Files whose newest mtime counts as the source time of every input.
    pub extra_deps: Vec<String>,
    pub options: ClassOptions,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub project: ProjectInfo,
    pub serve: ServeSection,
    default_tasks: Vec<TaskName>,
    classes: Vec<AssetClass>,
}

impl ConfigFile {
    /// Construct without validation. Callers should go through
    /// `ConfigFile::try_from(RawConfigFile)`.
    pub(crate) fn new_unchecked(
        project: ProjectInfo,
        serve: ServeSection,
        default_tasks: Vec<TaskName>,
        classes: Vec<AssetClass>,
    ) -> Self {
        Self {
            project,
            serve,
            default_tasks,
            classes,
        }
    }

    /// Re-anchor relative paths at `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project.root = root.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.project.root
    }

    pub fn classes(&self) -> &[AssetClass] {
        &self.classes
    }

    pub fn class(&self, kind: AssetKind) -> Option<&AssetClass> {
        self.classes.iter().find(|c| c.kind == kind)
    }

    pub fn class_by_task(&self, name: &str) -> Option<&AssetClass> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// Tasks that `default` depends on, in declared order.
    pub fn default_tasks(&self) -> &[TaskName] {
        &self.default_tasks
    }

    /// Absolute output directory of a class.
    pub fn output_dir(&self, class: &AssetClass) -> PathBuf {
        self.project.root.join(&class.output)
    }
}
