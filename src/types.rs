// src/types.rs

//! Small shared vocabulary types.

use std::fmt;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Name of the composite task that builds every class and then watches.
pub const DEFAULT_TASK: &str = "default";

/// Name of the task that removes the output root.
pub const CLEAN_TASK: &str = "clean";

/// The build concern an asset class covers.
///
/// Each kind owns exactly one task and one config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Html,
    Images,
    InlineImages,
    Styles,
    Scripts,
    Fonts,
}

impl AssetKind {
    /// Every kind, in the order classes are listed and reported.
    pub const ALL: [AssetKind; 6] = [
        AssetKind::Html,
        AssetKind::Images,
        AssetKind::InlineImages,
        AssetKind::Styles,
        AssetKind::Scripts,
        AssetKind::Fonts,
    ];

    /// Task name bound to this kind.
    pub fn task_name(self) -> &'static str {
        match self {
            AssetKind::Html => "html",
            AssetKind::Images => "images",
            AssetKind::InlineImages => "imguri",
            AssetKind::Styles => "sass",
            AssetKind::Scripts => "js",
            AssetKind::Fonts => "fonts",
        }
    }

    /// TOML section holding this kind's settings.
    pub fn section_name(self) -> &'static str {
        match self {
            AssetKind::Html => "html",
            AssetKind::Images => "images",
            AssetKind::InlineImages => "inline_images",
            AssetKind::Styles => "styles",
            AssetKind::Scripts => "scripts",
            AssetKind::Fonts => "fonts",
        }
    }

    /// Resolve a task name or alias (`styles`, `scripts`, `inline_images`).
    pub fn from_task_name(name: &str) -> Option<Self> {
        AssetKind::ALL
            .into_iter()
            .find(|kind| kind.task_name() == name || kind.section_name() == name)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.task_name())
    }
}

/// Map a task name or alias onto its canonical task name.
///
/// Names that are neither aliases nor class tasks are returned unchanged.
pub fn canonical_task_name(name: &str) -> String {
    match AssetKind::from_task_name(name) {
        Some(kind) => kind.task_name().to_string(),
        None => name.to_string(),
    }
}
