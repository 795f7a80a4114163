// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::Path;

use notify::EventKind;

use crate::fs::glob::to_match_str;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_match_str(rel));
    }

    // macOS reports /private/var/... for /var/... and similar.
    let (root_canon, path_canon) = (root.canonicalize().ok()?, path.canonicalize().ok()?);
    path_canon.strip_prefix(&root_canon).ok().map(to_match_str)
}

/// Editor swap files, backups and dotfiles.
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Only creations and modifications trigger rebuilds.
pub fn is_relevant(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use std::path::PathBuf;

    #[test]
    fn editor_artifacts_are_ignored() {
        assert!(is_temp_file(Path::new("src/scss/.main.scss.swp")));
        assert!(is_temp_file(Path::new("src/index.html~")));
        assert!(is_temp_file(Path::new("src/js/app.js.tmp")));
        assert!(!is_temp_file(Path::new("src/js/app.js")));
    }

    #[test]
    fn removals_do_not_trigger() {
        assert!(is_relevant(&EventKind::Create(CreateKind::File)));
        assert!(is_relevant(&EventKind::Modify(ModifyKind::Any)));
        assert!(!is_relevant(&EventKind::Remove(RemoveKind::File)));
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        let root = PathBuf::from("/p");
        assert_eq!(
            relative_str(&root, Path::new("/p/src/scss/main.scss")).as_deref(),
            Some("src/scss/main.scss")
        );
    }
}
