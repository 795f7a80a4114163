// src/fs/glob.rs

//! Glob helpers shared by source discovery, validation and the watcher.
//!
//! Patterns are always relative to the project root and use `/` as the
//! separator. `*` never crosses a directory boundary; use `**` for that.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use super::FileSystem;

const GLOB_META: &[char] = &['*', '?', '[', ']', '{', '}'];

/// Compile a single pattern.
pub fn compile(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))?;
    Ok(glob.compile_matcher())
}

/// Compile several patterns into one set.
pub fn compile_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// The literal directory prefix of a pattern.
///
/// `src/js/**/*` → `src/js`, `src/*.html` → `src`, `src/scss/main.scss` →
/// `src/scss`. Output paths mirror the part of a source path below this base.
pub fn glob_base(pattern: &str) -> PathBuf {
    let parts: Vec<&str> = pattern.split('/').collect();
    let mut base = PathBuf::new();
    for (idx, part) in parts.iter().enumerate() {
        let is_last = idx + 1 == parts.len();
        if is_last || part.contains(GLOB_META) {
            break;
        }
        base.push(part);
    }
    base
}

/// Normalise a root-relative path into the `/`-separated form globs match.
pub fn to_match_str(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Collect every file under `root` matching `pattern`, sorted by path.
///
/// Only the pattern's base directory is walked. A missing base yields an
/// empty list.
pub fn collect_matching(fs: &dyn FileSystem, root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = compile(pattern)?;
    let start = root.join(glob_base(pattern));
    if !fs.is_dir(&start) {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut stack = vec![start];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(root) {
                    if matcher.is_match(to_match_str(rel)) {
                        files.push(path);
                    }
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Collect the union of several patterns, sorted and deduplicated.
pub fn collect_all(fs: &dyn FileSystem, root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        files.extend(collect_matching(fs, root, pattern)?);
    }
    files.sort();
    files.dedup();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn base_stops_at_first_wildcard() {
        assert_eq!(glob_base("src/js/**/*"), PathBuf::from("src/js"));
        assert_eq!(glob_base("src/*.html"), PathBuf::from("src"));
        assert_eq!(glob_base("src/images/*.*"), PathBuf::from("src/images"));
        assert_eq!(glob_base("src/scss/main.scss"), PathBuf::from("src/scss"));
        assert_eq!(glob_base("*.html"), PathBuf::new());
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/index.html", "i");
        fs.add_file("/p/src/template/head.html", "h");

        let found = collect_matching(&fs, Path::new("/p"), "src/*.html").unwrap();
        assert_eq!(found, vec![PathBuf::from("/p/src/index.html")]);
    }

    #[test]
    fn double_star_recurses() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/js/a.js", "a");
        fs.add_file("/p/src/js/lib/b.js", "b");

        let found = collect_matching(&fs, Path::new("/p"), "src/js/**/*").unwrap();
        assert_eq!(
            found,
            vec![PathBuf::from("/p/src/js/a.js"), PathBuf::from("/p/src/js/lib/b.js")]
        );
    }

    #[test]
    fn missing_base_is_empty() {
        let fs = MockFileSystem::new();
        let found = collect_matching(&fs, Path::new("/p"), "src/fonts/*.*").unwrap();
        assert!(found.is_empty());
    }
}
