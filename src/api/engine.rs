//! Main migration engine implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::core::config::{validate_go_identifier_fragment, PkgshiftConfig};
use crate::core::errors::{PkgshiftError, Result};
use crate::core::file_utils::{absolutize, canonical_path, determine_output_file};
use crate::core::pipeline::{MigrationCoordinator, MigrationReport, MigrationRequest};
use crate::expose::{ExposePlanner, RenameSuggestion};
use crate::io::{GoSourceWriter, Project};

/// Main pkgshift engine
pub struct MigrationEngine {
    /// Engine configuration
    config: Arc<PkgshiftConfig>,

    /// Directory relative paths are resolved against
    work_dir: PathBuf,
}

impl MigrationEngine {
    /// Create an engine working from `work_dir`
    pub fn new(config: PkgshiftConfig, work_dir: impl AsRef<Path>) -> Result<Self> {
        config.validate()?;

        let work_dir = canonical_path(work_dir.as_ref());
        if !work_dir.is_dir() {
            return Err(PkgshiftError::validation(format!(
                "Working directory does not exist: {}",
                work_dir.display()
            )));
        }

        info!(work_dir = %work_dir.display(), "Initialized migration engine");
        Ok(Self {
            config: Arc::new(config),
            work_dir,
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &PkgshiftConfig {
        &self.config
    }

    /// Working directory
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Move one file into the package `destination`.
    ///
    /// `output` follows [`determine_output_file`]. The project is loaded
    /// fresh for every call.
    pub fn migrate(&self, target: &Path, destination: &str, output: Option<&Path>) -> Result<MigrationReport> {
        validate_destination(destination)?;

        let target = self.resolve_target(target)?;
        let output = canonical_path(&determine_output_file(&self.work_dir, &target, output)?);

        // A file already at the output path is overwritten by the writer. It
        // stays out of the project so it cannot shadow or clash with the
        // moved declarations, and stays on disk if the run fails first.
        let mut skip = Vec::new();
        if output != target && output.is_file() {
            info!(output = %output.display(), "Existing output file will be replaced");
            skip.push(output.clone());
        }

        let project = Project::load_excluding(&self.work_dir, &self.config.project, &skip)?;
        let writer = GoSourceWriter::new(self.config.output.clone());
        let request = MigrationRequest {
            target,
            destination: destination.to_string(),
            output,
        };

        MigrationCoordinator::new(&project, &self.config).run(&request, &writer)
    }

    /// Move several files one after another. Stops at the first failure.
    pub fn migrate_all(
        &self,
        targets: &[PathBuf],
        destination: &str,
        output: Option<&Path>,
    ) -> Result<Vec<MigrationReport>> {
        let mut reports = Vec::with_capacity(targets.len());
        for (i, target) in targets.iter().enumerate() {
            info!(target = %target.display(), step = i + 1, total = targets.len(), "Migrating");
            reports.push(self.migrate(target, destination, output)?);
        }
        Ok(reports)
    }

    /// Unexported names that moving `target` would break.
    pub fn plan_expose(&self, target: &Path) -> Result<Vec<RenameSuggestion>> {
        let target = self.resolve_target(target)?;
        let project = Project::load(&self.work_dir, &self.config.project)?;
        ExposePlanner::new(&project).plan(&target)
    }

    fn resolve_target(&self, target: &Path) -> Result<PathBuf> {
        let target = canonical_path(&absolutize(&self.work_dir, target));
        if !target.is_file() {
            return Err(PkgshiftError::target_not_found(&target));
        }
        Ok(target)
    }
}

fn validate_destination(destination: &str) -> Result<()> {
    let starts_with_digit = destination.chars().next().is_some_and(|c| c.is_ascii_digit());
    if destination.is_empty() || starts_with_digit {
        return Err(PkgshiftError::validation_field(
            format!("'{destination}' is not a valid package name"),
            "destination",
        ));
    }
    validate_go_identifier_fragment(destination, "destination")
}
