//! Configuration Layer Management
//!
//! Defaults, then a configuration file, then command-line flags. Later
//! layers win.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::cli::args::{MoveArgs, ProjectArgs};
use pkgshift::core::config::{PkgshiftConfig, QualifierDeletion};

/// Local configuration files picked up when `--config` is not given.
const IMPLICIT_CONFIG_FILES: &[&str] = &[".pkgshift.yml", ".pkgshift.yaml", ".pkgshift.json"];

/// Trait for applying command-line overrides onto a configuration
pub trait ApplyCliArgs<T> {
    /// Overwrite every field the arguments set explicitly
    fn apply_cli_args(&mut self, args: &T);
}

impl ApplyCliArgs<ProjectArgs> for PkgshiftConfig {
    fn apply_cli_args(&mut self, args: &ProjectArgs) {
        if !args.tags.is_empty() {
            self.project.build_tags = args
                .tags
                .iter()
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect();
        }
    }
}

impl ApplyCliArgs<MoveArgs> for PkgshiftConfig {
    fn apply_cli_args(&mut self, args: &MoveArgs) {
        self.apply_cli_args(&args.project);

        if let Some(prefix) = &args.add_prefix {
            self.rename.add_prefix = prefix.clone();
        }
        if let Some(prefix) = &args.delete_prefix {
            self.rename.delete_prefix = prefix.clone();
        }
        if let Some(jobs) = args.jobs {
            self.performance.max_workers = Some(jobs);
        }
        if args.structural_delete {
            self.output.qualifier_deletion = QualifierDeletion::Structural;
        }
        if let Some(formatter) = &args.formatter {
            self.output.formatter = Some(formatter.split_whitespace().map(str::to_string).collect());
        }
    }
}

/// Load the file layer: `--config`, else a local `.pkgshift.*`, else defaults.
pub fn load_file_layer(explicit: Option<&Path>, work_dir: &Path) -> anyhow::Result<PkgshiftConfig> {
    let implicit = || {
        IMPLICIT_CONFIG_FILES
            .iter()
            .map(|name| work_dir.join(name))
            .find(|path| path.is_file())
    };

    let path: Option<PathBuf> = explicit.map(Path::to_path_buf).or_else(implicit);
    match path {
        Some(path) => {
            tracing::debug!(config = %path.display(), "Loading configuration file");
            PkgshiftConfig::from_file(&path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        }
        None => Ok(PkgshiftConfig::default()),
    }
}

/// Build the effective configuration for `pkgshift move`
pub fn build_move_config(args: &MoveArgs) -> anyhow::Result<PkgshiftConfig> {
    let mut config = load_file_layer(args.project.config.as_deref(), &args.project.workdir)?;
    config.apply_cli_args(args);
    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}

/// Build the effective configuration for commands that only load a project
pub fn build_project_config(args: &ProjectArgs) -> anyhow::Result<PkgshiftConfig> {
    let mut config = load_file_layer(args.config.as_deref(), &args.workdir)?;
    config.apply_cli_args(args);
    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}
