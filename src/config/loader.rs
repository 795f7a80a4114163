// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{AssetdagError, Result};
use crate::fs::FileSystem;

/// Default config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "Assetdag.toml";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path, merge `package.json` identity, and
/// validate.
///
/// Relative paths in the result are anchored at the config file's directory.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw = load_from_path(path)?;
    finish(raw, config_root_dir(path))
}

/// Resolve the configuration the CLI asked for.
///
/// - An explicit path must exist.
/// - Without one, `Assetdag.toml` in `cwd` is used if present, and the
///   built-in layout otherwise.
pub fn load_for_cli(explicit: Option<&str>, cwd: &Path) -> Result<ConfigFile> {
    match explicit {
        Some(path) => {
            let path = PathBuf::from(path);
            if !path.is_file() {
                return Err(AssetdagError::ConfigError(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            load_and_validate(&path)
        }
        None => {
            let candidate = cwd.join(DEFAULT_CONFIG_FILE);
            if candidate.is_file() {
                load_and_validate(&candidate)
            } else {
                info!("no {DEFAULT_CONFIG_FILE} found; using built-in layout");
                finish(RawConfigFile::default(), cwd.to_path_buf())
            }
        }
    }
}

fn finish(mut raw: RawConfigFile, root: PathBuf) -> Result<ConfigFile> {
    merge_package_json(&mut raw, &root)?;
    Ok(ConfigFile::try_from(raw)?.with_root(root))
}

/// Fill `[project]` name/version/author from `package.json` when unset.
fn merge_package_json(raw: &mut RawConfigFile, root: &Path) -> Result<()> {
    let rel = raw
        .project
        .package_json
        .clone()
        .unwrap_or_else(|| "package.json".to_string());
    let path = root.join(&rel);
    if !path.is_file() {
        return Ok(());
    }

    let contents = fs::read_to_string(&path)?;
    let manifest: Value = serde_json::from_str(&contents).map_err(|e| {
        AssetdagError::ConfigError(format!("invalid JSON in {}: {e}", path.display()))
    })?;
    debug!(path = ?path, "merging project identity from package.json");

    apply_manifest(raw, &manifest);
    Ok(())
}

/// Copy identity fields from a parsed manifest into unset config fields.
///
/// `author` may be a plain string or an object with a `name`.
pub fn apply_manifest(raw: &mut RawConfigFile, manifest: &Value) {
    let project = &mut raw.project;
    if project.name.is_none() {
        project.name = manifest.get("name").and_then(Value::as_str).map(str::to_string);
    }
    if project.version.is_none() {
        project.version = manifest
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string);
    }
    if project.author.is_none() {
        project.author = match manifest.get("author") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Object(obj)) => obj.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        };
    }
}

/// Fail unless the configured source directory exists.
pub fn ensure_source_dir(cfg: &ConfigFile, fs: &dyn FileSystem) -> Result<()> {
    let dir = cfg.project.source_dir();
    if !fs.is_dir(&dir) {
        return Err(AssetdagError::ConfigError(format!(
            "source directory {} does not exist",
            dir.display()
        )));
    }
    Ok(())
}

/// Figure out the project root for a config path.
///
/// - If the config path has a non-empty parent (e.g. "site/Assetdag.toml"),
///   that directory is used.
/// - If it's just a bare filename like "Assetdag.toml" (parent = ""),
///   fall back to the current working directory "."
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn manifest_fills_only_missing_fields() {
        let mut raw = RawConfigFile::default();
        raw.project.version = Some("9.9.9".into());
        apply_manifest(
            &mut raw,
            &json!({"name": "shop", "version": "1.0.0", "author": {"name": "Ada"}}),
        );
        assert_eq!(raw.project.name.as_deref(), Some("shop"));
        assert_eq!(raw.project.version.as_deref(), Some("9.9.9"));
        assert_eq!(raw.project.author.as_deref(), Some("Ada"));
    }

    #[test]
    fn bare_file_name_roots_at_cwd() {
        let root = config_root_dir(Path::new("Assetdag.toml"));
        assert!(!root.as_os_str().is_empty());
        assert_eq!(
            config_root_dir(Path::new("site/Assetdag.toml")),
            PathBuf::from("site")
        );
    }
}
