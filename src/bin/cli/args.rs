//! CLI Argument Structures
//!
//! This module contains all CLI argument definitions and command structures
//! used by the pkgshift binary.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Move Go files between packages
#[derive(Parser)]
#[command(name = "pkgshift")]
#[command(version = VERSION)]
#[command(about = "Move Go files between packages and rewrite every reference")]
#[command(long_about = "
Move a Go source file into another package. References to the moved
declarations are rewritten across the whole module, names the moved file
still uses from its old package get qualified, and imports follow.

Common Usage:

  # Move alpha/widget.go into a new package beta
  pkgshift move --file alpha/widget.go --new beta --output beta

  # Rename moved declarations on the way (WidgetX -> X)
  pkgshift move --file alpha/widget.go --new beta --output beta --delete-prefix Widget

  # Move every file listed on stdin
  git ls-files 'alpha/*_widget.go' | pkgshift move --file - --new widgets --output widgets

  # List unexported names that must be exported before the move
  pkgshift expose --file alpha/widget.go
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Move files into another package
    Move(Box<MoveArgs>),

    /// Suggest renames that export names a move would break
    Expose(ExposeArgs),

    /// Print default configuration in YAML format
    #[command(name = "print-default-config")]
    PrintDefaultConfig,

    /// Validate a pkgshift configuration file
    #[command(name = "validate-config")]
    ValidateConfig(ValidateConfigArgs),
}

/// Project loading options shared by every command
#[derive(Args, Clone, Debug, Default)]
pub struct ProjectArgs {
    /// Working directory; relative paths are resolved against it
    #[arg(short = 'w', long, default_value = ".")]
    pub workdir: PathBuf,

    /// Build tags considered satisfied (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments of `pkgshift move`
#[derive(Args, Clone, Debug)]
pub struct MoveArgs {
    /// File to move; repeatable. `-` reads newline-separated paths from stdin
    #[arg(short, long = "file", required = true)]
    pub files: Vec<PathBuf>,

    /// Destination package name
    #[arg(short, long = "new", value_name = "PACKAGE")]
    pub new_package: String,

    /// Output file, or directory when it has no extension (default: in place)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub project: ProjectArgs,

    /// Prefix added to every moved declaration
    #[arg(long)]
    pub add_prefix: Option<String>,

    /// Prefix removed from every moved declaration
    #[arg(long)]
    pub delete_prefix: Option<String>,

    /// Worker threads for rewriting other files
    #[arg(short, long, env = "PKGSHIFT_JOBS")]
    pub jobs: Option<usize>,

    /// Cut redundant qualifiers from the source instead of stripping them
    /// from printed text
    #[arg(long)]
    pub structural_delete: bool,

    /// Formatter command run on every written file (e.g. "gofmt -w")
    #[arg(long)]
    pub formatter: Option<String>,

    /// Print the migration reports as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

/// Arguments of `pkgshift expose`
#[derive(Args, Clone, Debug)]
pub struct ExposeArgs {
    /// File that is about to be moved
    #[arg(short, long)]
    pub file: PathBuf,

    #[command(flatten)]
    pub project: ProjectArgs,

    /// Run each suggested rename instead of printing it
    #[arg(long)]
    pub execute: bool,
}

/// Arguments of `pkgshift validate-config`
#[derive(Args)]
pub struct ValidateConfigArgs {
    /// Configuration file to validate
    pub config: PathBuf,
}

/// Log line format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}
