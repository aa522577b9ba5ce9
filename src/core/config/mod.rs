//! Configuration types and management for pkgshift.
//!
//! A configuration file (YAML or JSON) supplies the defaults for a migration
//! run; command-line flags override individual fields afterwards.

pub mod validation;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{PkgshiftError, Result, ResultExt};

pub use validation::{validate_glob_patterns, validate_go_identifier_fragment, validate_positive_usize};

/// Main configuration for a pkgshift migration run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PkgshiftConfig {
    /// Source discovery settings
    #[serde(default)]
    pub project: ProjectConfig,

    /// Symbol rename rule applied to every moved declaration
    #[serde(default)]
    pub rename: RenameRule,

    /// Output writer settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Worker pool settings
    #[serde(default)]
    pub performance: PerformanceConfig,
}

/// Configuration construction and I/O methods for [`PkgshiftConfig`].
impl PkgshiftConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load configuration, choosing the format from the file extension.
    ///
    /// `.json` files are parsed as JSON, everything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_file(path)
        } else {
            Self::from_yaml_file(path)
        }
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.project.validate()?;
        self.rename.validate()?;
        self.output.validate()?;
        self.performance.validate()?;
        Ok(())
    }
}

/// Source discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectConfig {
    /// Build tags considered satisfied when evaluating `//go:build` lines
    #[serde(default)]
    pub build_tags: Vec<String>,

    /// Load `_test.go` files as migration candidates
    #[serde(default = "ProjectConfig::default_include_tests")]
    pub include_tests: bool,

    /// Glob patterns (relative to the module root) of files never loaded
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Files larger than this are skipped during discovery
    #[serde(default = "ProjectConfig::default_max_file_size_bytes")]
    pub max_file_size_bytes: u64,
}

/// Default implementation for [`ProjectConfig`].
impl Default for ProjectConfig {
    /// Returns the default project configuration.
    fn default() -> Self {
        Self {
            build_tags: Vec::new(),
            include_tests: Self::default_include_tests(),
            exclude_patterns: Vec::new(),
            max_file_size_bytes: Self::default_max_file_size_bytes(),
        }
    }
}

/// Default value providers and validation for [`ProjectConfig`].
impl ProjectConfig {
    const fn default_include_tests() -> bool {
        true
    }

    /// Generated Go files can get large; 8 MiB comfortably covers them.
    const fn default_max_file_size_bytes() -> u64 {
        8 * 1024 * 1024
    }

    /// Validate project configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_file_size_bytes == 0 {
            return Err(PkgshiftError::validation_field(
                "max_file_size_bytes must be greater than 0",
                "project.max_file_size_bytes",
            ));
        }

        for tag in &self.build_tags {
            if tag.trim().is_empty() || tag.contains(char::is_whitespace) {
                return Err(PkgshiftError::validation_field(
                    format!("build tag '{tag}' must be a single non-empty word"),
                    "project.build_tags",
                ));
            }
        }

        validate_glob_patterns(&self.exclude_patterns, "project.exclude_patterns")
    }
}

/// Prefix rewrite applied to the name of every moved declaration.
///
/// The delete prefix is stripped first (only when it is strictly shorter than
/// the name and actually present), then the add prefix is prepended.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenameRule {
    /// Prefix prepended to every moved name
    #[serde(default)]
    pub add_prefix: String,

    /// Prefix removed from every moved name
    #[serde(default)]
    pub delete_prefix: String,
}

impl RenameRule {
    /// Create a rule from its two prefixes
    pub fn new(add_prefix: impl Into<String>, delete_prefix: impl Into<String>) -> Self {
        Self {
            add_prefix: add_prefix.into(),
            delete_prefix: delete_prefix.into(),
        }
    }

    /// True when the rule leaves every name unchanged
    pub fn is_identity(&self) -> bool {
        self.add_prefix.is_empty() && self.delete_prefix.is_empty()
    }

    /// Apply the rule to one declaration name
    pub fn apply(&self, name: &str) -> String {
        let stem = if !self.delete_prefix.is_empty() && self.delete_prefix.len() < name.len() {
            name.strip_prefix(self.delete_prefix.as_str()).unwrap_or(name)
        } else {
            name
        };

        format!("{}{}", self.add_prefix, stem)
    }

    /// Validate rename configuration
    pub fn validate(&self) -> Result<()> {
        validate_go_identifier_fragment(&self.add_prefix, "rename.add_prefix")?;
        validate_go_identifier_fragment(&self.delete_prefix, "rename.delete_prefix")
    }
}

/// How placeholder qualifiers are removed from rendered output
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QualifierDeletion {
    /// Print the placeholder, then strip `"<placeholder>."` from the text
    #[default]
    Textual,
    /// Delete the qualifier's byte range from the source directly
    Structural,
}

/// Output writer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Placeholder deletion strategy
    #[serde(default)]
    pub qualifier_deletion: QualifierDeletion,

    /// External formatter command (program followed by arguments). The
    /// absolute output path is appended as the final argument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatter: Option<Vec<String>>,
}

/// Validation for [`OutputConfig`].
impl OutputConfig {
    /// Validate output configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(command) = &self.formatter {
            let program_missing = command.first().map_or(true, |p| p.trim().is_empty());
            if program_missing {
                return Err(PkgshiftError::validation_field(
                    "formatter command must name a program",
                    "output.formatter",
                ));
            }
        }
        Ok(())
    }
}

/// Performance and resource configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PerformanceConfig {
    /// Worker pool size for other-file rewriting (None = half the cores)
    #[serde(default)]
    pub max_workers: Option<usize>,
}

/// Validation and derived values for [`PerformanceConfig`].
impl PerformanceConfig {
    /// Validate performance configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(workers) = self.max_workers {
            validate_positive_usize(workers, "performance.max_workers")?;
        }
        Ok(())
    }

    /// Effective worker count: the configured value, otherwise
    /// `max(1, available_parallelism / 2)`.
    pub fn worker_count(&self) -> usize {
        self.max_workers.unwrap_or_else(|| {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            (cores / 2).max(1)
        })
    }
}
