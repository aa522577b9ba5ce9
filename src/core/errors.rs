//! Error types for the pkgshift library.
//!
//! Every fallible operation in the migration pipeline returns [`Result`]. The
//! variants follow the migration error taxonomy: parse failures of a single
//! file are recoverable, everything else aborts the run and carries enough
//! context (file path, declaration name) for a human to finish by hand.

use std::io;
use std::path::{Path, PathBuf};
use std::str::Utf8Error;

use thiserror::Error;

/// Main result type for pkgshift operations.
pub type Result<T> = std::result::Result<T, PkgshiftError>;

/// Error type for all pkgshift operations.
#[derive(Error, Debug)]
pub enum PkgshiftError {
    /// I/O related errors while reading sources or project metadata
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// A single file could not be parsed
    #[error("Parse error in {language}: {message}")]
    Parse {
        /// Programming language being parsed
        language: String,
        /// Error description
        message: String,
        /// File path where error occurred
        file_path: Option<String>,
        /// Line number (if available)
        line: Option<usize>,
        /// Column number (if available)
        column: Option<usize>,
    },

    /// The file being moved is not part of the loaded project
    #[error("Target file not found in loaded project: {}", path.display())]
    TargetNotFound {
        /// Absolute path of the requested target
        path: PathBuf,
    },

    /// No exported top-level declarations were found in the origin namespace
    #[error("No exported top-level declarations found in namespace '{namespace}' (origin file {}); the file may contain syntax errors", file.display())]
    EmptySymbolSet {
        /// Origin namespace name
        namespace: String,
        /// Origin file
        file: PathBuf,
    },

    /// Persisting one output file failed
    #[error("Failed to write {}: {message}", path.display())]
    Write {
        /// Output path
        path: PathBuf,
        /// Error description
        message: String,
        /// Underlying I/O error, if any
        #[source]
        source: Option<io::Error>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Data type being serialized
        data_type: Option<String>,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
    },

    /// Worker pool and scheduling errors
    #[error("Concurrency error: {message}")]
    Concurrency {
        /// Error description
        message: String,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
        /// Additional context
        context: Option<String>,
    },
}

impl PkgshiftError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new parse error
    pub fn parse(language: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            language: language.into(),
            message: message.into(),
            file_path: None,
            line: None,
            column: None,
        }
    }

    /// Create a new parse error with file context
    pub fn parse_with_location(
        language: impl Into<String>,
        message: impl Into<String>,
        file_path: impl Into<String>,
        line: Option<usize>,
        column: Option<usize>,
    ) -> Self {
        Self::Parse {
            language: language.into(),
            message: message.into(),
            file_path: Some(file_path.into()),
            line,
            column,
        }
    }

    /// Create a target-not-found error
    pub fn target_not_found(path: impl AsRef<Path>) -> Self {
        Self::TargetNotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create an empty-symbol-set error
    pub fn empty_symbol_set(namespace: impl Into<String>, file: impl AsRef<Path>) -> Self {
        Self::EmptySymbolSet {
            namespace: namespace.into(),
            file: file.as_ref().to_path_buf(),
        }
    }

    /// Create a write error without an underlying I/O cause
    pub fn write(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Write {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a write error wrapping an I/O failure
    pub fn write_io(path: impl AsRef<Path>, message: impl Into<String>, source: io::Error) -> Self {
        Self::Write {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new validation error naming the offending field
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new concurrency error
    pub fn concurrency(message: impl Into<String>) -> Self {
        Self::Concurrency {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Whether the coordinator may skip the offending file and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        match &mut self {
            Self::Internal { context: ctx, .. } => {
                *ctx = Some(context.into());
            }
            Self::Io { message, .. }
            | Self::Write { message, .. }
            | Self::Config { message, .. }
            | Self::Serialization { message, .. } => {
                *message = format!("{}: {}", context.into(), message);
            }
            _ => {}
        }
        self
    }
}

impl From<io::Error> for PkgshiftError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for PkgshiftError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            data_type: Some("JSON".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for PkgshiftError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            data_type: Some("YAML".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<Utf8Error> for PkgshiftError {
    fn from(err: Utf8Error) -> Self {
        Self::parse("unknown", format!("UTF-8 encoding error: {err}"))
    }
}

impl From<globset::Error> for PkgshiftError {
    fn from(err: globset::Error) -> Self {
        Self::config_field(format!("Invalid glob pattern: {err}"), "exclude_patterns")
    }
}

impl From<rayon::ThreadPoolBuildError> for PkgshiftError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::concurrency(format!("Failed to build worker pool: {err}"))
    }
}

/// Result extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error result
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<PkgshiftError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }

    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| e.into().with_context(msg))
    }
}
