//! Source provider: loads a Go module into parsed trees plus a binding index.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::core::ast::SyntaxTree;
use crate::core::config::ProjectConfig;
use crate::core::errors::{PkgshiftError, Result};
use crate::core::file_utils::{canonical_path, FileReader, ModuleInfo};
use crate::core::pipeline::file_discovery::discover_files;
use crate::lang::build_constraints::BuildContext;
use crate::lang::go::{GoAdapter, LoweredFile};
use crate::oracle::{FileId, NamespaceId, ProjectIndex};

/// One loaded file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Id within the project
    pub id: FileId,
    /// Absolute path
    pub path: PathBuf,
    /// Parsed tree; `None` when the file has syntax errors
    pub tree: Option<SyntaxTree>,
    /// Why the file could not be parsed
    pub parse_error: Option<String>,
}

impl SourceFile {
    /// Whether the file parsed cleanly
    pub fn is_parsed(&self) -> bool {
        self.tree.is_some()
    }
}

/// Every Go file of a module, parsed and indexed.
#[derive(Debug, Clone)]
pub struct Project {
    module: ModuleInfo,
    files: Vec<SourceFile>,
    index: ProjectIndex,
}

enum Loaded {
    Parsed(PathBuf, LoweredFile),
    Unparseable(PathBuf, String),
}

impl Project {
    /// Load the module enclosing `work_dir`.
    ///
    /// Files excluded by build constraints are dropped; files with syntax
    /// errors are kept without a tree.
    pub fn load(work_dir: &Path, config: &ProjectConfig) -> Result<Self> {
        Self::load_excluding(work_dir, config, &[])
    }

    /// [`Project::load`], leaving out the files in `skip` (absolute,
    /// canonical paths) as if they did not exist.
    pub fn load_excluding(work_dir: &Path, config: &ProjectConfig, skip: &[PathBuf]) -> Result<Self> {
        let work_dir = canonical_path(work_dir);
        let module = ModuleInfo::discover(&work_dir)?;
        let mut paths = discover_files(&module.root, config)?;
        paths.retain(|path| {
            let skipped = skip.contains(&canonical_path(path));
            if skipped {
                debug!(file = %path.display(), "Left out of the project");
            }
            !skipped
        });
        let build = BuildContext::host(config.build_tags.iter().cloned());

        let sources: Vec<(PathBuf, String)> = paths
            .par_iter()
            .map(|path| FileReader::read_to_string(path).map(|source| (path.clone(), source)))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .filter(|(path, source)| {
                let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                let included = build.matches_file_name(file_name) && build.matches_source(source);
                if !included {
                    debug!(file = %path.display(), "Excluded by build constraints");
                }
                included
            })
            .collect();

        Self::from_sources(module, sources)
    }

    /// Build a project from in-memory sources. Paths should be absolute and
    /// inside `module.root`.
    pub fn from_sources(module: ModuleInfo, sources: Vec<(PathBuf, String)>) -> Result<Self> {
        let loaded: Vec<Loaded> = sources
            .into_par_iter()
            .map_init(GoAdapter::new, |adapter, (path, source)| {
                let adapter = adapter
                    .as_mut()
                    .map_err(|e| PkgshiftError::internal(format!("Go parser unavailable: {e}")))?;
                match adapter.lower_file(&path, source) {
                    Ok(lowered) => Ok(Loaded::Parsed(path, lowered)),
                    Err(err) if err.is_recoverable() => {
                        warn!(file = %path.display(), error = %err, "File has syntax errors");
                        Ok(Loaded::Unparseable(path, err.to_string()))
                    }
                    Err(err) => Err(err),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let mut index = ProjectIndex::new();
        let mut files = Vec::with_capacity(loaded.len());

        for (slot, item) in loaded.into_iter().enumerate() {
            let id = FileId(slot as u32);
            match item {
                Loaded::Parsed(path, lowered) => {
                    let namespace = namespace_for(&module, &path, &lowered.facts.package)?;
                    index.insert(id, path.clone(), namespace, lowered.facts);
                    files.push(SourceFile {
                        id,
                        path,
                        tree: Some(lowered.tree),
                        parse_error: None,
                    });
                }
                Loaded::Unparseable(path, error) => files.push(SourceFile {
                    id,
                    path,
                    tree: None,
                    parse_error: Some(error),
                }),
            }
        }

        let project = Self {
            module,
            files,
            index: index.finish(),
        };
        info!(
            module = %project.module.module_path,
            files = project.files.len(),
            unparseable = project.files.iter().filter(|f| !f.is_parsed()).count(),
            "Loaded project"
        );
        Ok(project)
    }

    /// Enclosing Go module
    pub fn module(&self) -> &ModuleInfo {
        &self.module
    }

    /// Every loaded file
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// File by id
    pub fn file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.index())
    }

    /// File loaded from `path`
    pub fn find(&self, path: &Path) -> Option<FileId> {
        let wanted = canonical_path(path);
        self.files
            .iter()
            .find(|file| file.path == wanted || file.path == path)
            .map(|file| file.id)
    }

    /// Binding index over the parsed files
    pub fn index(&self) -> &ProjectIndex {
        &self.index
    }

    /// Import path of the package that would live in `dir`
    pub fn import_path_for_dir(&self, dir: &Path) -> Result<String> {
        self.module.import_path_for_dir(&canonical_path(dir))
    }
}

/// External test packages (`package x_test` in a `_test.go` file) get their
/// own import path so they do not merge with the package under test.
fn namespace_for(module: &ModuleInfo, path: &Path, package: &str) -> Result<NamespaceId> {
    let dir = path.parent().unwrap_or(&module.root);
    let mut import_path = module.import_path_for_dir(dir)?;
    if package.ends_with("_test") && FileReader::is_go_test_file(path) {
        import_path.push_str("_test");
    }
    Ok(NamespaceId::new(package, import_path))
}
