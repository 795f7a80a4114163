// src/mode.rs

//! Development / production mode resolution.
//!
//! The mode is decided once from `NODE_ENV` and then passed explicitly to
//! everything that varies by mode. Nothing reads the variable afterwards.

use std::fmt;

use tracing::info;

use crate::config::model::ProjectInfo;

/// Environment variable that selects the build mode.
pub const MODE_ENV_VAR: &str = "NODE_ENV";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    /// Interpret the raw value of the mode variable.
    ///
    /// Only `production` (after trimming and case folding) selects
    /// production; anything else, including an absent variable, is
    /// development.
    pub fn from_signal(value: Option<&str>) -> Self {
        match value {
            Some(raw) if raw.trim().to_lowercase() == "production" => BuildMode::Production,
            _ => BuildMode::Development,
        }
    }

    /// Read the mode from the process environment.
    pub fn from_env() -> Self {
        Self::from_signal(std::env::var(MODE_ENV_VAR).ok().as_deref())
    }

    pub fn is_production(self) -> bool {
        self == BuildMode::Production
    }

    pub fn label(self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The one-line build banner, e.g. `site 1.0.0, development build`.
pub fn banner(project: &ProjectInfo, mode: BuildMode) -> String {
    format!("{} {}, {} build", project.name, project.version, mode)
}

/// Resolve the mode from the environment and announce it.
pub fn resolve(project: &ProjectInfo) -> BuildMode {
    let mode = BuildMode::from_env();
    info!(mode = %mode, author = %project.author, "{}", banner(project, mode));
    mode
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_is_matched_after_trim_and_case_fold() {
        assert_eq!(BuildMode::from_signal(Some("production")), BuildMode::Production);
        assert_eq!(BuildMode::from_signal(Some("  Production\n")), BuildMode::Production);
        assert_eq!(BuildMode::from_signal(Some("PRODUCTION")), BuildMode::Production);
    }

    #[test]
    fn everything_else_is_development() {
        assert_eq!(BuildMode::from_signal(None), BuildMode::Development);
        assert_eq!(BuildMode::from_signal(Some("")), BuildMode::Development);
        assert_eq!(BuildMode::from_signal(Some("prod")), BuildMode::Development);
        assert_eq!(BuildMode::from_signal(Some("staging")), BuildMode::Development);
    }

    #[test]
    fn banner_names_project_and_mode() {
        let project = ProjectInfo {
            name: "site".into(),
            version: "1.0.0".into(),
            author: "someone".into(),
            ..ProjectInfo::default()
        };
        assert_eq!(
            banner(&project, BuildMode::Production),
            "site 1.0.0, production build"
        );
    }
}
