//! Go source discovery.
//!
//! Walks a module root the way the Go tool chooses package files: `vendor`,
//! `testdata` and `_`/`.`-prefixed directories are never entered, nested
//! modules (directories with their own `go.mod`) are left out, and the
//! configured exclude globs and size limit apply on top.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};
use tracing::{debug, info, warn};

use crate::core::config::ProjectConfig;
use crate::core::errors::{PkgshiftError, Result};
use crate::core::file_utils::FileReader;

/// Directories the Go tool never treats as package directories.
const SKIPPED_DIRS: &[&str] = &["vendor", "testdata"];

/// Discover the Go files of the module rooted at `root`.
pub fn discover_files(root: &Path, config: &ProjectConfig) -> Result<Vec<PathBuf>> {
    let root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let exclude_glob = compile_globset(&config.exclude_patterns)?;

    let walk_root = root.clone();
    let walker = WalkBuilder::new(&root)
        .standard_filters(false)
        .hidden(false)
        .follow_links(false)
        .filter_entry(move |entry| keep_directory(entry, &walk_root))
        .build();

    let mut unique = HashSet::new();
    let mut collected = Vec::new();

    for entry in walker {
        let dir_entry = match entry {
            Ok(dir_entry) => dir_entry,
            Err(err) => {
                warn!("Failed to walk directory: {err}");
                continue;
            }
        };

        let is_file = dir_entry.file_type().map(|ft| ft.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }

        let path = dir_entry.path();
        if should_keep(path, &root, config, exclude_glob.as_ref()) && unique.insert(path.to_path_buf()) {
            collected.push(path.to_path_buf());
        }
    }

    collected.sort();
    info!(root = %root.display(), files = collected.len(), "File discovery completed");
    Ok(collected)
}

fn keep_directory(entry: &DirEntry, root: &Path) -> bool {
    let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
    if !is_dir || entry.path() == root {
        return true;
    }

    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') || name.starts_with('_') || SKIPPED_DIRS.contains(&name.as_ref()) {
        debug!(dir = %entry.path().display(), "Skipping directory");
        return false;
    }

    if entry.path().join("go.mod").is_file() {
        debug!(dir = %entry.path().display(), "Skipping nested module");
        return false;
    }
    true
}

fn should_keep(
    path: &Path,
    base: &Path,
    config: &ProjectConfig,
    exclude_glob: Option<&GlobSet>,
) -> bool {
    if !FileReader::is_go_file(path) {
        return false;
    }

    // Go ignores files starting with `_` or `.` just like directories.
    let hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('_') || name.starts_with('.'));
    if hidden {
        return false;
    }

    if !config.include_tests && FileReader::is_go_test_file(path) {
        return false;
    }

    // 0 means unlimited
    if config.max_file_size_bytes > 0 {
        if let Ok(metadata) = fs::metadata(path) {
            if metadata.len() > config.max_file_size_bytes {
                warn!(file = %path.display(), size = metadata.len(), "Skipping oversized file");
                return false;
            }
        }
    }

    let relative = path.strip_prefix(base).unwrap_or(path);
    !exclude_glob.is_some_and(|exclude| exclude.is_match(relative))
}

fn compile_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    let mut builder = GlobSetBuilder::new();
    let mut added = false;

    for pattern in patterns {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            continue;
        }

        let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .map_err(|err| {
                PkgshiftError::config_field(
                    format!("Invalid glob pattern '{pattern}': {err}"),
                    "project.exclude_patterns",
                )
            })?;
        builder.add(glob);
        added = true;
    }

    if added {
        builder
            .build()
            .map(Some)
            .map_err(|err| PkgshiftError::config(format!("Failed to build glob set: {err}")))
    } else {
        Ok(None)
    }
}
