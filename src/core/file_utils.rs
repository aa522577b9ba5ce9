//! File utilities for safe and robust file operations.
//!
//! Reading Go sources with lossy UTF-8 fallback, resolving where a moved file
//! is written, and locating the enclosing Go module.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::core::errors::{PkgshiftError, Result};

/// Safe file reading with UTF-8 validation and fallback handling
pub struct FileReader;

impl FileReader {
    /// Read a file to string, handling non-UTF-8 files gracefully
    pub fn read_to_string(file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                let bytes = fs::read(file_path).map_err(|err| {
                    PkgshiftError::io(
                        format!("Failed to read file as bytes: {}", file_path.display()),
                        err,
                    )
                })?;

                warn!(
                    "File contained invalid UTF-8, converted with lossy encoding: {}",
                    file_path.display()
                );
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            Err(e) => Err(PkgshiftError::io(
                format!("Failed to read file: {}", file_path.display()),
                e,
            )),
        }
    }

    /// Check whether a path names a Go source file
    pub fn is_go_file(file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "go")
    }

    /// Check whether a path names a Go test file (`*_test.go`)
    pub fn is_go_test_file(file_path: &Path) -> bool {
        file_path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with("_test.go"))
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component. The filesystem is not consulted.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Resolve `path` against `base` when relative, then normalize it.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&base.join(path))
    }
}

/// Resolve symlinks where the path exists; for a missing file, resolve its
/// parent directory and keep the file name.
pub fn canonical_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|dir| dir.join(name))
            .unwrap_or_else(|_| normalize_path(path)),
        _ => normalize_path(path),
    }
}

/// Determine the absolute output path for a migrated file.
///
/// * no output requested: the target's own path
/// * relative output: joined onto the working directory
/// * output without an extension: treated as a directory, and the target's
///   file name is appended
///
/// The parent directory of the result is created when missing.
pub fn determine_output_file(
    work_dir: &Path,
    target_file: &Path,
    output: Option<&Path>,
) -> Result<PathBuf> {
    let requested = match output {
        Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
        _ => target_file.to_path_buf(),
    };

    let mut resolved = absolutize(work_dir, &requested);

    let has_extension = resolved
        .extension()
        .is_some_and(|ext| !ext.is_empty());
    if !has_extension {
        let file_name = target_file.file_name().ok_or_else(|| {
            PkgshiftError::validation(format!(
                "Target path has no file name: {}",
                target_file.display()
            ))
        })?;
        resolved.push(file_name);
    }

    if let Some(parent) = resolved.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            PkgshiftError::io(
                format!("Failed to create output directory: {}", parent.display()),
                e,
            )
        })?;
    }

    debug!(target = %target_file.display(), output = %resolved.display(), "Resolved output path");
    Ok(resolved)
}

/// The Go module enclosing a working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Directory containing `go.mod`
    pub root: PathBuf,
    /// Module path declared by the `module` directive
    pub module_path: String,
}

impl ModuleInfo {
    /// Walk up from `start` until a `go.mod` is found and parse its module path.
    pub fn discover(start: &Path) -> Result<Self> {
        let mut current = normalize_path(start);
        loop {
            let candidate = current.join("go.mod");
            if candidate.is_file() {
                let content = FileReader::read_to_string(&candidate)?;
                let module_path = parse_module_directive(&content).ok_or_else(|| {
                    PkgshiftError::config(format!(
                        "go.mod at {} has no module directive",
                        candidate.display()
                    ))
                })?;
                return Ok(Self {
                    root: current,
                    module_path,
                });
            }

            if !current.pop() {
                return Err(PkgshiftError::config(format!(
                    "go.mod not found in any parent directory of {}",
                    start.display()
                )));
            }
        }
    }

    /// Import path of the package living in `dir` (which must be inside the module).
    pub fn import_path_for_dir(&self, dir: &Path) -> Result<String> {
        let relative = normalize_path(dir)
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .map_err(|_| {
                PkgshiftError::validation(format!(
                    "{} is outside module root {}",
                    dir.display(),
                    self.root.display()
                ))
            })?;

        let mut import_path = self.module_path.clone();
        for component in relative.components() {
            if let Component::Normal(part) = component {
                import_path.push('/');
                import_path.push_str(&part.to_string_lossy());
            }
        }
        Ok(import_path)
    }
}

/// Extract the module path from `go.mod` content.
pub fn parse_module_directive(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let line = line.split("//").next().unwrap_or("").trim();
        let rest = line.strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let path = rest.trim().trim_matches('"');
        (!path.is_empty()).then(|| path.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_to_string_valid_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("widget.go");
        fs::write(&file_path, "package alpha\n").unwrap();

        let content = FileReader::read_to_string(&file_path).unwrap();
        assert_eq!(content, "package alpha\n");
    }

    #[test]
    fn test_read_to_string_invalid_utf8_is_lossy() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("latin1.go");
        fs::write(&file_path, b"package alpha\n// caf\xe9\n").unwrap();

        let content = FileReader::read_to_string(&file_path).unwrap();
        assert!(content.starts_with("package alpha"));
        assert!(content.contains('\u{FFFD}'));
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let err = FileReader::read_to_string(Path::new("/definitely/not/here.go")).unwrap_err();
        assert!(matches!(err, PkgshiftError::Io { .. }));
    }

    #[test]
    fn test_go_file_predicates() {
        assert!(FileReader::is_go_file(Path::new("a/widget.go")));
        assert!(!FileReader::is_go_file(Path::new("a/widget.rs")));
        assert!(FileReader::is_go_test_file(Path::new("a/widget_test.go")));
        assert!(!FileReader::is_go_test_file(Path::new("a/widget.go")));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/work/./alpha/../beta/x.go")),
            PathBuf::from("/work/beta/x.go")
        );
    }

    #[test]
    fn test_output_defaults_to_target() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("alpha/widget.go");

        let output = determine_output_file(temp_dir.path(), &target, None).unwrap();
        assert_eq!(output, target);
        assert!(temp_dir.path().join("alpha").is_dir());
    }

    #[test]
    fn test_relative_directory_output_appends_target_name() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("alpha/widget.go");

        let output =
            determine_output_file(temp_dir.path(), &target, Some(Path::new("beta"))).unwrap();
        assert_eq!(output, temp_dir.path().join("beta/widget.go"));
        assert!(temp_dir.path().join("beta").is_dir());
    }

    #[test]
    fn test_relative_file_output_is_joined_to_workdir() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("alpha/widget.go");

        let output = determine_output_file(
            temp_dir.path(),
            &target,
            Some(Path::new("./beta/gadget.go")),
        )
        .unwrap();
        assert_eq!(output, temp_dir.path().join("beta/gadget.go"));
    }

    #[test]
    fn test_parse_module_directive() {
        assert_eq!(
            parse_module_directive("// header\nmodule example.com/shop // main\n\ngo 1.22\n"),
            Some("example.com/shop".to_string())
        );
        assert_eq!(parse_module_directive("go 1.22\n"), None);
        assert_eq!(parse_module_directive("modules foo\n"), None);
    }

    #[test]
    fn test_module_discovery_walks_up() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("go.mod"),
            "module example.com/shop\n\ngo 1.22\n",
        )
        .unwrap();
        let nested = temp_dir.path().join("internal/alpha");
        fs::create_dir_all(&nested).unwrap();

        let module = ModuleInfo::discover(&nested).unwrap();
        assert_eq!(module.root, temp_dir.path());
        assert_eq!(module.module_path, "example.com/shop");
        assert_eq!(
            module.import_path_for_dir(&nested).unwrap(),
            "example.com/shop/internal/alpha"
        );
        assert_eq!(
            module.import_path_for_dir(temp_dir.path()).unwrap(),
            "example.com/shop"
        );
    }
}
