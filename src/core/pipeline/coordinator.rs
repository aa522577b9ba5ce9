//! Migration coordinator.
//!
//! Drives one migration through `Priming -> FanningOut -> Flushing -> Done`.
//! Priming rewrites the moved file on the calling thread and fixes the
//! symbol set; only then are the remaining files fanned out to a bounded
//! worker pool. Any fatal error moves the run to `Failed`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::context::{MigrationContext, MigrationWarning, ModifiedFile, WarningKind};
use crate::core::config::PkgshiftConfig;
use crate::core::errors::{PkgshiftError, Result};
use crate::core::file_utils::FileReader;
use crate::io::source::{Project, SourceFile};
use crate::io::writer::OutputWriter;
use crate::oracle::{BindingOracle, NamespaceId};
use crate::refactor::{rewrite_file, DecisionCounts, RewriteMode, SymbolSet};

/// Coordinator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    /// Rewriting the moved file and computing the symbol set
    Priming,
    /// Rewriting every other file on the worker pool
    FanningOut,
    /// Writing registered files
    Flushing,
    /// Finished successfully
    Done,
    /// Aborted by a fatal error
    Failed,
}

/// What to move where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRequest {
    /// Absolute path of the file to move
    pub target: PathBuf,
    /// Package name of the destination
    pub destination: String,
    /// Absolute path the moved file is written to
    pub output: PathBuf,
}

/// Outcome of one migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Moved file
    pub target: PathBuf,
    /// Where it was written
    pub output: PathBuf,
    /// Namespace it left
    pub origin_namespace: NamespaceId,
    /// Namespace it joined
    pub destination_namespace: NamespaceId,
    /// Exported names that moved
    pub moved_symbols: Vec<String>,
    /// Exported names that stayed
    pub retained_symbols: Vec<String>,
    /// Files written, moved file included
    pub files_rewritten: Vec<PathBuf>,
    /// Files skipped because they could not be parsed
    pub files_skipped: Vec<PathBuf>,
    /// Applied decisions per kind
    pub decisions: DecisionCounts,
    /// Non-fatal findings
    pub warnings: Vec<MigrationWarning>,
    /// Whether the original file was deleted
    pub origin_removed: bool,
}

/// Rewritten but not yet written migration.
#[derive(Debug)]
pub struct MigrationPlan {
    ctx: MigrationContext,
    skipped: Vec<PathBuf>,
}

impl MigrationPlan {
    /// Context the plan was computed with
    pub fn context(&self) -> &MigrationContext {
        &self.ctx
    }

    /// Output paths that will be written
    pub fn outputs(&self) -> Vec<PathBuf> {
        self.ctx.registered_paths()
    }

    /// Files skipped during fan-out
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }
}

/// Runs one migration over a loaded project.
pub struct MigrationCoordinator<'p> {
    project: &'p Project,
    config: &'p PkgshiftConfig,
    phase: MigrationPhase,
}

impl<'p> MigrationCoordinator<'p> {
    /// Create a coordinator in the `Priming` state
    pub fn new(project: &'p Project, config: &'p PkgshiftConfig) -> Self {
        Self {
            project,
            config,
            phase: MigrationPhase::Priming,
        }
    }

    /// Current state
    pub fn phase(&self) -> MigrationPhase {
        self.phase
    }

    /// Plan and flush in one go.
    pub fn run(&mut self, request: &MigrationRequest, writer: &dyn OutputWriter) -> Result<MigrationReport> {
        let plan = self.plan(request)?;
        self.flush(plan, writer)
    }

    /// Rewrite the moved file, then every other file. Nothing is written.
    pub fn plan(&mut self, request: &MigrationRequest) -> Result<MigrationPlan> {
        self.transition(MigrationPhase::Priming);
        let ctx = match self.prime(request) {
            Ok(ctx) => ctx,
            Err(err) => return Err(self.fail(err)),
        };

        self.transition(MigrationPhase::FanningOut);
        match self.fan_out(&ctx) {
            Ok(skipped) => Ok(MigrationPlan { ctx, skipped }),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Write every registered file and remove the original when the moved
    /// file was relocated.
    pub fn flush(&mut self, plan: MigrationPlan, writer: &dyn OutputWriter) -> Result<MigrationReport> {
        self.transition(MigrationPhase::Flushing);
        match self.write_all(plan, writer) {
            Ok(report) => {
                self.transition(MigrationPhase::Done);
                Ok(report)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn transition(&mut self, next: MigrationPhase) {
        debug!(from = ?self.phase, to = ?next, "Phase transition");
        info!(phase = ?next, "Migration phase");
        self.phase = next;
    }

    fn fail(&mut self, err: PkgshiftError) -> PkgshiftError {
        error!(phase = ?self.phase, error = %err, "Migration failed");
        self.phase = MigrationPhase::Failed;
        err
    }

    fn prime(&self, request: &MigrationRequest) -> Result<MigrationContext> {
        let index = self.project.index();
        let target_id = self
            .project
            .find(&request.target)
            .ok_or_else(|| PkgshiftError::target_not_found(&request.target))?;
        let target = self
            .project
            .file(target_id)
            .ok_or_else(|| PkgshiftError::target_not_found(&request.target))?;

        let (Some(tree), Some(origin)) = (target.tree.clone(), index.namespace_of(target_id)) else {
            let namespace = target
                .path
                .parent()
                .and_then(|dir| dir.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Err(PkgshiftError::empty_symbol_set(namespace, &target.path));
        };

        let destination = self.destination_namespace(request, target)?;
        let origin_decls = index.declarations(&origin);
        let destination_decls = index
            .namespace_at(&destination.import_path)
            .map(|ns| index.declarations(ns))
            .unwrap_or_default();

        let symbols = SymbolSet::classify(&origin_decls, &target.path).with_collisions(
            &destination_decls,
            &self.config.rename,
            &target.path,
        );
        if symbols.is_empty() {
            return Err(PkgshiftError::empty_symbol_set(origin.to_string(), &target.path));
        }

        info!(
            target = %target.path.display(),
            origin = %origin,
            destination = %destination,
            moved = symbols.moved.len(),
            retained = symbols.retained.len(),
            "Primed migration"
        );

        let ctx = MigrationContext::new(
            origin,
            target.path.clone(),
            target_id,
            destination.clone(),
            request.output.clone(),
            self.config.rename.clone(),
            self.config.output.qualifier_deletion,
            symbols,
        );

        if let Some(existing) = index.namespace_at(&destination.import_path) {
            if existing.name != destination.name {
                ctx.warn(MigrationWarning::file(
                    WarningKind::PackageNameMismatch,
                    &request.output,
                    format!(
                        "destination directory holds package `{}`, not `{}`",
                        existing.name, destination.name
                    ),
                ));
            }
        }

        let rewrite = rewrite_file(&ctx, index, target_id, tree, RewriteMode::MovedFile)?;
        ctx.add_decisions(&rewrite.decisions);
        if rewrite.modified || ctx.relocates() {
            ctx.register(ModifiedFile {
                source: target_id,
                source_path: target.path.clone(),
                output_path: request.output.clone(),
                tree: rewrite.tree,
                modified: rewrite.modified,
                namespace: destination,
                imports: rewrite.imports,
            });
        }
        Ok(ctx)
    }

    fn destination_namespace(&self, request: &MigrationRequest, target: &SourceFile) -> Result<NamespaceId> {
        let dir = request.output.parent().unwrap_or(&self.project.module().root);
        let mut import_path = self.project.import_path_for_dir(dir)?;
        if request.destination.ends_with("_test") && FileReader::is_go_test_file(&target.path) {
            import_path.push_str("_test");
        }
        Ok(NamespaceId::new(request.destination.clone(), import_path))
    }

    fn worker_pool(&self) -> Result<ThreadPool> {
        let workers = self.config.performance.worker_count();
        debug!(workers, "Building worker pool");
        Ok(ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("pkgshift-worker-{i}"))
            .build()?)
    }

    fn fan_out(&self, ctx: &MigrationContext) -> Result<Vec<PathBuf>> {
        let candidates: Vec<&SourceFile> = self
            .project
            .files()
            .iter()
            .filter(|file| file.id != ctx.origin_file_id && file.path != ctx.output_file)
            .collect();
        info!(candidates = candidates.len(), "Fanning out");

        let cancelled = AtomicBool::new(false);
        let first_error: Mutex<Option<PkgshiftError>> = Mutex::new(None);
        let skipped: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

        self.worker_pool()?.install(|| {
            candidates.par_iter().for_each(|file| {
                // Running workers finish their file; queued ones never start.
                if cancelled.load(Ordering::SeqCst) {
                    return;
                }
                match self.rewrite_other(ctx, file) {
                    Ok(()) => {}
                    Err(err) if err.is_recoverable() => {
                        ctx.warn(MigrationWarning::file(
                            WarningKind::SkippedFile,
                            &file.path,
                            format!("skipped: {err}"),
                        ));
                        skipped.lock().push(file.path.clone());
                    }
                    Err(err) => {
                        cancelled.store(true, Ordering::SeqCst);
                        first_error.lock().get_or_insert(err);
                    }
                }
            });
        });

        if let Some(err) = first_error.into_inner() {
            return Err(err);
        }
        let mut skipped = skipped.into_inner();
        skipped.sort();
        Ok(skipped)
    }

    fn rewrite_other(&self, ctx: &MigrationContext, file: &SourceFile) -> Result<()> {
        let Some(tree) = &file.tree else {
            return Err(PkgshiftError::parse_with_location(
                "go",
                file.parse_error.clone().unwrap_or_else(|| "unparseable file".to_string()),
                file.path.display().to_string(),
                None,
                None,
            ));
        };

        let index = self.project.index();
        let in_origin = index
            .namespace_of(file.id)
            .is_some_and(|ns| ns.import_path == ctx.origin.import_path);
        let imports_origin = tree.imports().iter().any(|spec| spec.path == ctx.origin.import_path);
        if !in_origin && !imports_origin {
            return Ok(());
        }

        let rewrite = rewrite_file(ctx, index, file.id, tree.clone(), RewriteMode::OtherFile)?;
        ctx.add_decisions(&rewrite.decisions);
        if !rewrite.modified {
            return Ok(());
        }

        let namespace = index.namespace_of(file.id).ok_or_else(|| {
            PkgshiftError::internal(format!("{} lost its namespace", file.path.display()))
        })?;
        ctx.register(ModifiedFile {
            source: file.id,
            source_path: file.path.clone(),
            output_path: file.path.clone(),
            tree: rewrite.tree,
            modified: true,
            namespace,
            imports: rewrite.imports,
        });
        Ok(())
    }

    fn write_all(&self, plan: MigrationPlan, writer: &dyn OutputWriter) -> Result<MigrationReport> {
        let MigrationPlan { ctx, skipped } = plan;
        let files = ctx.take_modified();

        let cancelled = AtomicBool::new(false);
        let first_error: Mutex<Option<PkgshiftError>> = Mutex::new(None);
        self.worker_pool()?.install(|| {
            files.par_iter().for_each(|file| {
                if cancelled.load(Ordering::SeqCst) {
                    return;
                }
                if let Err(err) = writer.write(file) {
                    cancelled.store(true, Ordering::SeqCst);
                    first_error.lock().get_or_insert(err);
                }
            });
        });
        if let Some(err) = first_error.into_inner() {
            return Err(err);
        }

        let mut origin_removed = false;
        if ctx.relocates() && ctx.origin_file.exists() {
            remove_origin(&ctx.origin_file)?;
            origin_removed = true;
        }

        let mut files_rewritten: Vec<PathBuf> = files.iter().map(|f| f.output_path.clone()).collect();
        files_rewritten.sort();

        Ok(MigrationReport {
            target: ctx.origin_file.clone(),
            output: ctx.output_file.clone(),
            origin_namespace: ctx.origin.clone(),
            destination_namespace: ctx.destination.clone(),
            moved_symbols: ctx.symbols.moved.iter().cloned().collect(),
            retained_symbols: ctx.symbols.retained.iter().cloned().collect(),
            files_rewritten,
            files_skipped: skipped,
            decisions: ctx.decisions(),
            warnings: ctx.warnings(),
            origin_removed,
        })
    }
}

fn remove_origin(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| PkgshiftError::write_io(path, "failed to remove original file", e))?;
    info!(file = %path.display(), "Removed original file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::file_utils::ModuleInfo;

    fn project(files: &[(&str, &str)]) -> Project {
        let root = PathBuf::from("/shop");
        Project::from_sources(
            ModuleInfo {
                root: root.clone(),
                module_path: "example.com/shop".to_string(),
            },
            files
                .iter()
                .map(|(path, source)| (root.join(path), source.to_string()))
                .collect(),
        )
        .unwrap()
    }

    fn request(target: &str, destination: &str, output: &str) -> MigrationRequest {
        MigrationRequest {
            target: PathBuf::from(target),
            destination: destination.to_string(),
            output: PathBuf::from(output),
        }
    }

    /// Writer that records paths instead of touching the disk.
    #[derive(Default)]
    struct RecordingWriter {
        written: Mutex<Vec<PathBuf>>,
        fail_on: Option<PathBuf>,
    }

    impl OutputWriter for RecordingWriter {
        fn write(&self, file: &ModifiedFile) -> Result<()> {
            if self.fail_on.as_deref() == Some(file.output_path.as_path()) {
                return Err(PkgshiftError::write(&file.output_path, "disk full"));
            }
            self.written.lock().push(file.output_path.clone());
            Ok(())
        }
    }

    const WIDGET: &str = "package alpha\n\ntype Widget struct{}\n\nfunc NewWidget() *Widget { return &Widget{} }\n";
    const HELPER: &str = "package alpha\n\nfunc Helper() *Widget { return NewWidget() }\n";
    const GAMMA: &str = "package gamma\n\nimport \"example.com/shop/alpha\"\n\nvar _ = alpha.NewWidget()\n";
    const UNRELATED: &str = "package delta\n\nvar X = 1\n";

    #[test]
    fn missing_target_fails_before_any_work() {
        let project = project(&[("alpha/widget.go", WIDGET)]);
        let config = PkgshiftConfig::default();
        let mut coordinator = MigrationCoordinator::new(&project, &config);

        let err = coordinator
            .plan(&request("/shop/alpha/nope.go", "beta", "/shop/beta/nope.go"))
            .unwrap_err();
        assert!(matches!(err, PkgshiftError::TargetNotFound { .. }));
        assert_eq!(coordinator.phase(), MigrationPhase::Failed);
    }

    #[test]
    fn unparseable_target_is_empty_symbol_set() {
        let project = project(&[("alpha/widget.go", "package alpha\n\nfunc (\n")]);
        let config = PkgshiftConfig::default();
        let mut coordinator = MigrationCoordinator::new(&project, &config);

        let err = coordinator
            .plan(&request("/shop/alpha/widget.go", "beta", "/shop/beta/widget.go"))
            .unwrap_err();
        assert!(matches!(err, PkgshiftError::EmptySymbolSet { .. }));
    }

    #[test]
    fn plan_registers_only_affected_files() {
        let project = project(&[
            ("alpha/widget.go", WIDGET),
            ("alpha/helper.go", HELPER),
            ("gamma/main.go", GAMMA),
            ("delta/delta.go", UNRELATED),
            ("alpha/broken.go", "package alpha\n\nfunc (\n"),
        ]);
        let config = PkgshiftConfig::default();
        let mut coordinator = MigrationCoordinator::new(&project, &config);

        let plan = coordinator
            .plan(&request("/shop/alpha/widget.go", "beta", "/shop/beta/widget.go"))
            .unwrap();
        assert_eq!(coordinator.phase(), MigrationPhase::FanningOut);

        let mut outputs = plan.outputs();
        outputs.sort();
        assert_eq!(
            outputs,
            vec![
                PathBuf::from("/shop/alpha/helper.go"),
                PathBuf::from("/shop/beta/widget.go"),
                PathBuf::from("/shop/gamma/main.go"),
            ]
        );
        assert_eq!(plan.skipped(), &[PathBuf::from("/shop/alpha/broken.go")]);
        assert!(plan.context().symbols.is_moved("Widget"));
        assert!(plan.context().symbols.is_retained("Helper"));
    }

    #[test]
    fn write_failure_fails_the_run() {
        let project = project(&[
            ("alpha/widget.go", WIDGET),
            ("alpha/helper.go", HELPER),
        ]);
        let config = PkgshiftConfig::default();
        let writer = RecordingWriter {
            fail_on: Some(PathBuf::from("/shop/alpha/helper.go")),
            ..RecordingWriter::default()
        };

        let mut coordinator = MigrationCoordinator::new(&project, &config);
        let err = coordinator
            .run(
                &request("/shop/alpha/widget.go", "beta", "/shop/beta/widget.go"),
                &writer,
            )
            .unwrap_err();
        assert!(matches!(err, PkgshiftError::Write { .. }));
        assert_eq!(coordinator.phase(), MigrationPhase::Failed);
    }

    #[test]
    fn in_place_migration_reports_without_removing() {
        let project = project(&[("alpha/widget.go", WIDGET), ("alpha/helper.go", HELPER)]);
        let config = PkgshiftConfig::default();
        let writer = RecordingWriter::default();

        let mut coordinator = MigrationCoordinator::new(&project, &config);
        let report = coordinator
            .run(
                &request("/shop/alpha/widget.go", "beta", "/shop/alpha/widget.go"),
                &writer,
            )
            .unwrap();

        assert_eq!(coordinator.phase(), MigrationPhase::Done);
        assert!(!report.origin_removed);
        assert_eq!(report.moved_symbols, vec!["NewWidget", "Widget"]);
        assert_eq!(report.destination_namespace.name, "beta");
        assert!(report
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::PackageNameMismatch));
    }
}
