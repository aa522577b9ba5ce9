//! Expose planner.
//!
//! Moving a file to another package breaks every reference to an unexported
//! name that crosses the file boundary. The planner finds those names and
//! suggests `gopls rename` commands that export them before the move.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::errors::{PkgshiftError, Result};
use crate::io::source::Project;
use crate::oracle::{
    is_exported, BindingKind, BindingOracle, FileId, MemberDecl, NameUse, NamespaceId,
};

/// Program used to apply suggestions
pub const DEFAULT_RENAME_TOOL: &str = "gopls";

/// Rename of one unexported declaration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RenameSuggestion {
    /// Declaring file
    pub file: PathBuf,
    /// 1-based line of the declaring identifier
    pub line: usize,
    /// 1-based byte column of the declaring identifier
    pub column: usize,
    /// Current name
    pub from: String,
    /// Exported name
    pub to: String,
}

impl RenameSuggestion {
    /// Arguments for `program rename -w file:line:col To`
    pub fn args(&self) -> Vec<String> {
        vec![
            "rename".to_string(),
            "-w".to_string(),
            format!("{}:{}:{}", self.file.display(), self.line, self.column),
            self.to.clone(),
        ]
    }
}

impl fmt::Display for RenameSuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", DEFAULT_RENAME_TOOL, self.args().join(" "))
    }
}

/// Finds unexported names a move would break.
pub struct ExposePlanner<'p> {
    project: &'p Project,
}

impl<'p> ExposePlanner<'p> {
    /// Plan against a loaded project
    pub fn new(project: &'p Project) -> Self {
        Self { project }
    }

    /// Unexported names of the target's package that are declared in the
    /// target and used by a sibling, or the other way round. Top-level names
    /// are suggested at their declaration, struct fields and methods at the
    /// field or method name.
    pub fn plan(&self, target: &Path) -> Result<Vec<RenameSuggestion>> {
        let index = self.project.index();
        let target_id = self
            .project
            .find(target)
            .ok_or_else(|| PkgshiftError::target_not_found(target))?;
        let namespace = index.namespace_of(target_id).ok_or_else(|| {
            PkgshiftError::validation(format!("{} could not be parsed", target.display()))
        })?;
        let target_path = index
            .path(target_id)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| target.to_path_buf());

        let mut crossing = BTreeSet::new();
        for file in index.files_in(&namespace) {
            for (node, _) in index.uses(file) {
                let Some(binding) = index.resolve(file, node) else {
                    continue;
                };
                if !binding.is_declaration_in(&namespace) || is_exported(&binding.name) {
                    continue;
                }
                let declared_in_target = binding.declaring_file.as_deref() == Some(target_path.as_path());
                let used_in_target = file == target_id;
                if declared_in_target != used_in_target {
                    crossing.insert(binding.name);
                }
            }
        }

        let declarations = index.declarations(&namespace);
        let mut suggestions = Vec::new();
        for name in crossing {
            let to = exported_spelling(&name);
            if !is_exported(&to) {
                warn!(name = %name, "Name cannot be exported by capitalizing it");
                continue;
            }
            if declarations.iter().any(|decl| decl.name == to) {
                warn!(name = %name, to = %to, "Exported spelling already declared; skipping");
                continue;
            }
            let Some(decl) = declarations.iter().find(|decl| decl.name == name) else {
                continue;
            };
            let Some(span) = self.declaring_span(&decl.declaring_file, &name) else {
                debug!(name = %name, "Declaring identifier not found");
                continue;
            };
            suggestions.push(RenameSuggestion {
                file: decl.declaring_file.clone(),
                line: span.0,
                column: span.1,
                from: name,
                to,
            });
        }

        suggestions.extend(self.member_suggestions(target_id, &namespace));
        suggestions.sort();
        suggestions.dedup();
        info!(
            target = %target_path.display(),
            suggestions = suggestions.len(),
            "Planned exposes"
        );
        Ok(suggestions)
    }

    /// Unexported struct fields and methods used across the target
    /// boundary. Selectors on values carry no type, so uses are matched to
    /// declarations by name.
    fn member_suggestions(&self, target_id: FileId, namespace: &NamespaceId) -> Vec<RenameSuggestion> {
        let index = self.project.index();

        let mut users: HashMap<&str, BTreeSet<FileId>> = HashMap::new();
        for file in index.files_in(namespace) {
            for (_, site) in index.uses(file) {
                let NameUse::Member { operand } = site.kind else {
                    continue;
                };
                let qualified = index
                    .resolve(file, operand)
                    .is_some_and(|binding| binding.kind == BindingKind::Namespace);
                if !qualified && !is_exported(&site.name) {
                    users.entry(site.name.as_str()).or_default().insert(file);
                }
            }
            for key in index.field_keys(file) {
                if !is_exported(key) {
                    users.entry(key.as_str()).or_default().insert(file);
                }
            }
        }

        let members: Vec<(FileId, &MemberDecl)> = index
            .files_in(namespace)
            .flat_map(|file| index.members(file).iter().map(move |member| (file, member)))
            .collect();

        let mut suggestions = Vec::new();
        for (file, member) in &members {
            if is_exported(&member.name) {
                continue;
            }
            let declared_in_target = *file == target_id;
            let crosses = users
                .get(member.name.as_str())
                .is_some_and(|files| files.iter().any(|user| (*user == target_id) != declared_in_target));
            if !crosses {
                continue;
            }
            let to = exported_spelling(&member.name);
            if !is_exported(&to) {
                warn!(name = %member.name, "Name cannot be exported by capitalizing it");
                continue;
            }
            if members.iter().any(|(_, other)| other.owner == member.owner && other.name == to) {
                warn!(owner = %member.owner, name = %member.name, to = %to, "Exported spelling already declared; skipping");
                continue;
            }
            let Some(path) = index.path(*file) else {
                continue;
            };
            debug!(owner = %member.owner, name = %member.name, kind = ?member.kind, "Member crosses the file boundary");
            suggestions.push(RenameSuggestion {
                file: path.to_path_buf(),
                line: member.span.line,
                column: member.span.column,
                from: member.name.clone(),
                to,
            });
        }
        suggestions
    }

    fn declaring_span(&self, file: &Path, name: &str) -> Option<(usize, usize)> {
        let index = self.project.index();
        let id = self.project.find(file)?;
        index
            .uses(id)
            .filter(|(_, site)| site.kind == NameUse::Declares && site.name == name)
            .map(|(_, site)| (site.span.line, site.span.column))
            .min()
    }
}

/// Runs rename suggestions through an external tool.
#[derive(Debug, Clone)]
pub struct ExposeExecutor {
    program: String,
    work_dir: Option<PathBuf>,
}

impl Default for ExposeExecutor {
    fn default() -> Self {
        Self {
            program: DEFAULT_RENAME_TOOL.to_string(),
            work_dir: None,
        }
    }
}

impl ExposeExecutor {
    /// Use `program` instead of `gopls`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Run commands from `dir`
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Apply every suggestion in order. A failed command is logged and the
    /// rest still run; the failed suggestions are returned.
    pub fn execute(&self, suggestions: &[RenameSuggestion]) -> Vec<RenameSuggestion> {
        let mut failed = Vec::new();
        for suggestion in suggestions {
            let mut command = Command::new(&self.program);
            command.args(suggestion.args());
            if let Some(dir) = &self.work_dir {
                command.current_dir(dir);
            }

            match command.output() {
                Ok(output) if output.status.success() => {
                    info!(from = %suggestion.from, to = %suggestion.to, "Renamed");
                }
                Ok(output) => {
                    warn!(
                        from = %suggestion.from,
                        status = %output.status,
                        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                        "Rename command failed"
                    );
                    failed.push(suggestion.clone());
                }
                Err(err) => {
                    warn!(from = %suggestion.from, program = %self.program, error = %err, "Could not run rename command");
                    failed.push(suggestion.clone());
                }
            }
        }
        failed
    }
}

fn exported_spelling(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
