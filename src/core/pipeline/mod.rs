//! Migration pipeline.
//!
//! The pipeline moves one Go file between packages in three phases:
//!
//! 1. **Priming**: rewrite the moved file and fix the moved/retained symbol
//!    partition
//! 2. **Fanning out**: rewrite every other affected file on a bounded
//!    worker pool
//! 3. **Flushing**: write the registered files and remove the original
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pkgshift::core::config::PkgshiftConfig;
//! use pkgshift::core::pipeline::{MigrationCoordinator, MigrationRequest};
//! use pkgshift::io::{GoSourceWriter, Project};
//!
//! # fn main() -> pkgshift::core::errors::Result<()> {
//! let config = PkgshiftConfig::default();
//! let project = Project::load("./shop".as_ref(), &config.project)?;
//! let request = MigrationRequest {
//!     target: "/shop/alpha/widget.go".into(),
//!     destination: "beta".into(),
//!     output: "/shop/beta/widget.go".into(),
//! };
//! let writer = GoSourceWriter::new(config.output.clone());
//! let report = MigrationCoordinator::new(&project, &config).run(&request, &writer)?;
//! println!("{} files rewritten", report.files_rewritten.len());
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod coordinator;
pub mod file_discovery;

pub use context::{ImportEdits, MigrationContext, MigrationWarning, ModifiedFile, WarningKind};
pub use coordinator::{
    MigrationCoordinator, MigrationPhase, MigrationPlan, MigrationReport, MigrationRequest,
};
pub use file_discovery::discover_files;
