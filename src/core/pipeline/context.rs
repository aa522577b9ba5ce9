//! Per-run migration context.
//!
//! [`MigrationContext`] holds the immutable description of one migration
//! plus the only state workers share: the visited-node registry, the
//! modified-file registry, collected warnings and decision counts. It is
//! created by the coordinator for one target file and dropped after flush.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::ast::{NodeId, Span, SyntaxTree};
use crate::core::config::{QualifierDeletion, RenameRule};
use crate::oracle::{FileId, NamespaceId};
use crate::refactor::{DecisionCounts, SymbolSet};

/// Category of a non-fatal finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// The name is declared in both the origin and the destination namespace
    AmbiguousBinding,
    /// An unexported name is referenced across the new namespace boundary
    UnexportedReference,
    /// A renamed type is embedded, so its implicit field name changes too
    EmbeddedRename,
    /// A file could not be parsed and was left untouched
    SkippedFile,
    /// The destination directory already holds a package with another name
    PackageNameMismatch,
}

/// A non-fatal finding recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationWarning {
    /// Category
    pub kind: WarningKind,
    /// File the finding is about
    pub file: PathBuf,
    /// Symbol involved, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// 1-based line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// 1-based column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    /// Human-readable description
    pub message: String,
}

impl MigrationWarning {
    /// Warning about a symbol occurrence at `span`
    pub fn at(
        kind: WarningKind,
        file: impl Into<PathBuf>,
        symbol: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            file: file.into(),
            symbol: Some(symbol.into()),
            line: Some(span.line),
            column: Some(span.column),
            message: message.into(),
        }
    }

    /// Warning about a whole file
    pub fn file(kind: WarningKind, file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            file: file.into(),
            symbol: None,
            line: None,
            column: None,
            message: message.into(),
        }
    }
}

/// Import changes a rewritten file needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportEdits {
    /// Import path -> explicit local name (when the package name differs
    /// from the name derived from the path)
    pub add: BTreeMap<String, Option<String>>,
    /// Import paths to drop
    pub remove: BTreeSet<String>,
}

impl ImportEdits {
    /// Whether no import changes are needed
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// A file registered for output.
#[derive(Debug, Clone)]
pub struct ModifiedFile {
    /// File the tree was loaded from
    pub source: FileId,
    /// Path the tree was loaded from
    pub source_path: PathBuf,
    /// Absolute path the result is written to
    pub output_path: PathBuf,
    /// Rewritten tree
    pub tree: SyntaxTree,
    /// Whether any identifier changed
    pub modified: bool,
    /// Namespace the file belongs to after the migration
    pub namespace: NamespaceId,
    /// Import normalization to perform on output
    pub imports: ImportEdits,
}

#[derive(Debug, Default)]
struct RunState {
    visited: Mutex<HashSet<(FileId, NodeId)>>,
    modified: Mutex<IndexMap<PathBuf, ModifiedFile>>,
    warnings: Mutex<Vec<MigrationWarning>>,
    decisions: Mutex<DecisionCounts>,
}

/// One migration: configuration plus shared run state.
#[derive(Debug)]
pub struct MigrationContext {
    /// Namespace the target file leaves
    pub origin: NamespaceId,
    /// The file being moved
    pub origin_file: PathBuf,
    /// Id of the file being moved
    pub origin_file_id: FileId,
    /// Namespace the target file joins
    pub destination: NamespaceId,
    /// Absolute output path of the moved file
    pub output_file: PathBuf,
    /// Rename applied to moved declarations
    pub rename: RenameRule,
    /// How redundant qualifiers are removed
    pub qualifier_deletion: QualifierDeletion,
    /// Moved/retained partition of the origin namespace
    pub symbols: SymbolSet,
    state: RunState,
}

impl MigrationContext {
    /// Create a context with empty run state
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        origin: NamespaceId,
        origin_file: PathBuf,
        origin_file_id: FileId,
        destination: NamespaceId,
        output_file: PathBuf,
        rename: RenameRule,
        qualifier_deletion: QualifierDeletion,
        symbols: SymbolSet,
    ) -> Self {
        Self {
            origin,
            origin_file,
            origin_file_id,
            destination,
            output_file,
            rename,
            qualifier_deletion,
            symbols,
            state: RunState::default(),
        }
    }

    /// Whether origin and destination are the same namespace
    pub fn is_same_namespace(&self) -> bool {
        self.origin.import_path == self.destination.import_path
    }

    /// Whether the moved file is written somewhere else
    pub fn relocates(&self) -> bool {
        self.origin_file != self.output_file
    }

    /// Record a node as processed. Returns false if it already was.
    pub fn mark_visited(&self, file: FileId, node: NodeId) -> bool {
        self.state.visited.lock().insert((file, node))
    }

    /// Whether a node has been processed
    pub fn is_visited(&self, file: FileId, node: NodeId) -> bool {
        self.state.visited.lock().contains(&(file, node))
    }

    /// Register a file for output, keyed by its output path.
    pub fn register(&self, file: ModifiedFile) {
        let mut modified = self.state.modified.lock();
        if modified.contains_key(&file.output_path) {
            warn!(output = %file.output_path.display(), "Output path registered twice; keeping the later tree");
        }
        modified.insert(file.output_path.clone(), file);
    }

    /// Output paths registered so far
    pub fn registered_paths(&self) -> Vec<PathBuf> {
        self.state.modified.lock().keys().cloned().collect()
    }

    /// Whether a file is registered at `output_path`
    pub fn is_registered(&self, output_path: &Path) -> bool {
        self.state.modified.lock().contains_key(output_path)
    }

    /// Take every registered file, leaving the registry empty
    pub fn take_modified(&self) -> Vec<ModifiedFile> {
        let mut modified = self.state.modified.lock();
        std::mem::take(&mut *modified).into_values().collect()
    }

    /// Record a warning
    pub fn warn(&self, warning: MigrationWarning) {
        warn!(
            kind = ?warning.kind,
            file = %warning.file.display(),
            symbol = warning.symbol.as_deref().unwrap_or(""),
            "{}",
            warning.message
        );
        self.state.warnings.lock().push(warning);
    }

    /// Warnings recorded so far
    pub fn warnings(&self) -> Vec<MigrationWarning> {
        self.state.warnings.lock().clone()
    }

    /// Add one file's decision counts to the run totals
    pub fn add_decisions(&self, counts: &DecisionCounts) {
        self.state.decisions.lock().merge(counts);
    }

    /// Decision totals so far
    pub fn decisions(&self) -> DecisionCounts {
        self.state.decisions.lock().clone()
    }
}
