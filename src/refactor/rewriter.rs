//! Reference rewriter.
//!
//! Walks one file's tree and decides, for every identifier and qualified
//! reference, whether it gains a qualifier, loses one, is renamed or stays
//! as written. Two modes exist:
//!
//! * [`RewriteMode::MovedFile`]: the file that changes namespace. Names it
//!   keeps using from the origin namespace get qualified with the origin,
//!   its own declarations follow the rename rule, and qualifiers naming the
//!   destination become redundant.
//! * [`RewriteMode::OtherFile`]: every other file. References to moved
//!   declarations get the destination qualifier, or lose their qualifier
//!   when the file already lives in the destination.
//!
//! Every decision starts from [`BindingOracle::resolve`], so local bindings
//! that shadow a package name are never touched.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, trace};

use super::decision::{DecisionCounts, RewriteDecision};
use crate::core::ast::{IdentRole, ImportSpec, NodeId, NodeKind, Span, SyntaxTree};
use crate::core::config::QualifierDeletion;
use crate::core::errors::{PkgshiftError, Result};
use crate::core::pipeline::context::{ImportEdits, MigrationContext, MigrationWarning, WarningKind};
use crate::oracle::{default_package_name, Binding, BindingKind, BindingOracle, FileId, NamespaceId};

/// Which side of the migration a file is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteMode {
    /// The file being moved
    MovedFile,
    /// Any other file of the project
    OtherFile,
}

/// Result of rewriting one file.
#[derive(Debug, Clone)]
pub struct FileRewrite {
    /// Rewritten tree
    pub tree: SyntaxTree,
    /// Whether any identifier changed
    pub modified: bool,
    /// Import normalization the file needs
    pub imports: ImportEdits,
    /// Decisions applied in this file
    pub decisions: DecisionCounts,
}

/// Rewrites one file's tree against a migration context.
pub struct ReferenceRewriter<'a> {
    ctx: &'a MigrationContext,
    oracle: &'a dyn BindingOracle,
    file: FileId,
    mode: RewriteMode,
    namespace: NamespaceId,
    tree: SyntaxTree,
    /// Import path -> qualifier used for it
    required: BTreeMap<String, String>,
    decisions: DecisionCounts,
    modified: bool,
    warned: HashSet<(WarningKind, String)>,
}

impl<'a> ReferenceRewriter<'a> {
    /// Prepare a rewrite of `tree`, which must be the tree of `file`.
    pub fn new(
        ctx: &'a MigrationContext,
        oracle: &'a dyn BindingOracle,
        file: FileId,
        tree: SyntaxTree,
        mode: RewriteMode,
    ) -> Result<Self> {
        let namespace = oracle.namespace_of(file).ok_or_else(|| {
            PkgshiftError::internal(format!("{} is not indexed", tree.path().display()))
        })?;
        Ok(Self {
            ctx,
            oracle,
            file,
            mode,
            namespace,
            tree,
            required: BTreeMap::new(),
            decisions: DecisionCounts::default(),
            modified: false,
            warned: HashSet::new(),
        })
    }

    /// Walk the whole tree and return the rewritten file.
    pub fn rewrite(mut self) -> FileRewrite {
        let root = self.tree.root();
        self.visit(root);
        let imports = self.import_edits();
        debug!(
            file = %self.tree.path().display(),
            mode = ?self.mode,
            changes = self.decisions.changes(),
            "Rewrote file"
        );
        FileRewrite {
            modified: self.modified,
            imports,
            decisions: self.decisions,
            tree: self.tree,
        }
    }

    fn visit(&mut self, id: NodeId) {
        let Some(kind) = self.tree.kind(id) else {
            return;
        };

        match kind {
            NodeKind::File { package, decls, .. } => {
                let package = *package;
                let decls = decls.clone();
                self.package_clause(package);
                for decl in decls {
                    self.visit(decl);
                }
            }
            NodeKind::Import(_) => {}
            NodeKind::Ident(_) => self.ident(id),
            NodeKind::Selector { operand, member } => {
                let (operand, member) = (*operand, *member);
                self.selector(operand, member);
            }
            // Struct-literal keys carry the CompositeKey role and are
            // skipped by the identifier handler; other keys are expressions.
            NodeKind::KeyedElement { key, value } => {
                let (key, value) = (*key, *value);
                self.visit(key);
                self.visit(value);
            }
            NodeKind::Field { .. }
            | NodeKind::CompositeLit { .. }
            | NodeKind::ValueSpec { .. }
            | NodeKind::TypeSpec { .. }
            | NodeKind::FuncDecl { .. }
            | NodeKind::FuncLit { .. }
            | NodeKind::Generic { .. }
            | NodeKind::TypeSwitch { .. }
            | NodeKind::CaseClause { .. }
            | NodeKind::TypeCtor { .. }
            | NodeKind::Group { .. } => self.visit_children(id),
        }
    }

    fn visit_children(&mut self, id: NodeId) {
        for child in self.tree.children(id) {
            self.visit(child);
        }
    }

    fn package_clause(&mut self, package: NodeId) {
        if self.mode != RewriteMode::MovedFile || !self.ctx.mark_visited(self.file, package) {
            return;
        }
        let destination = self.ctx.destination.name.clone();
        let renamed = match self.tree.ident_mut(package) {
            Some(ident) if ident.name != destination => {
                ident.name = destination.clone();
                true
            }
            _ => false,
        };
        if renamed {
            self.modified = true;
            self.decisions.record(&RewriteDecision::RenameOnly { name: destination });
        }
    }

    fn ident(&mut self, id: NodeId) {
        let Some(ident) = self.tree.ident(id) else {
            return;
        };
        if !matches!(ident.role, IdentRole::Reference | IdentRole::Declaration) {
            return;
        }
        if !self.ctx.mark_visited(self.file, id) {
            return;
        }
        let Some(binding) = self.oracle.resolve(self.file, id) else {
            return;
        };
        if !binding.is_declaration_in(&self.ctx.origin) {
            return;
        }

        let span = self.tree.span(id);
        let decision = match self.mode {
            RewriteMode::MovedFile => self.moved_file_name(&binding, span),
            RewriteMode::OtherFile => self.other_file_name(&binding, span),
        };
        trace!(name = %binding.name, line = span.line, ?decision, "Bare reference");
        self.apply_bare(id, decision);
    }

    fn moved_file_name(&mut self, binding: &Binding, span: Span) -> RewriteDecision {
        let ctx = self.ctx;
        let name = binding.name.as_str();
        let symbols = &ctx.symbols;

        if symbols.is_retained(name) {
            if self.ctx.is_same_namespace() {
                return RewriteDecision::Unchanged;
            }
            let origin = self.ctx.origin.clone();
            let qualifier = self.qualifier_for(&origin);
            return RewriteDecision::AddQualifier {
                qualifier,
                name: name.to_string(),
            };
        }

        if symbols.is_moved(name) {
            if symbols.is_ambiguous(name) {
                self.warn_ambiguous(name, span);
                return RewriteDecision::Unchanged;
            }
            return self.rename_only(binding, span);
        }

        let declared_elsewhere = binding.declaring_file.as_deref() != Some(self.ctx.origin_file.as_path());
        if declared_elsewhere && !self.ctx.is_same_namespace() {
            self.warn_once(
                WarningKind::UnexportedReference,
                name,
                span,
                format!(
                    "`{}` is unexported and stays in {}; expose it before moving",
                    name, self.ctx.origin
                ),
            );
        }
        RewriteDecision::Unchanged
    }

    fn other_file_name(&mut self, binding: &Binding, span: Span) -> RewriteDecision {
        let ctx = self.ctx;
        let name = binding.name.as_str();
        let symbols = &ctx.symbols;

        if symbols.is_moved(name) {
            if symbols.is_ambiguous(name) {
                self.warn_ambiguous(name, span);
                return RewriteDecision::Unchanged;
            }
            if self.in_destination() {
                return self.rename_only(binding, span);
            }
            let new_name = self.renamed(binding, span);
            let destination = self.ctx.destination.clone();
            let qualifier = self.qualifier_for(&destination);
            return RewriteDecision::AddQualifier {
                qualifier,
                name: new_name,
            };
        }

        let declared_in_moved = binding.declaring_file.as_deref() == Some(self.ctx.origin_file.as_path());
        if declared_in_moved && !symbols.contains(name) && !self.ctx.is_same_namespace() {
            self.warn_once(
                WarningKind::UnexportedReference,
                name,
                span,
                format!(
                    "`{}` is unexported and moves to {}; expose it before moving",
                    name, self.ctx.destination
                ),
            );
        }
        RewriteDecision::Unchanged
    }

    fn selector(&mut self, operand: NodeId, member: NodeId) {
        if !self.ctx.mark_visited(self.file, member) {
            return;
        }

        let qualifier = self
            .tree
            .ident(operand)
            .and_then(|_| self.oracle.resolve(self.file, operand))
            .filter(|binding| binding.kind == BindingKind::Namespace);

        let Some(qualifier) = qualifier else {
            // `value.Field`, `pkgVar.Method()`, `a.b.c`: only the operand can
            // refer to a moved declaration.
            self.visit(operand);
            return;
        };
        self.ctx.mark_visited(self.file, operand);

        let decision = match self.mode {
            RewriteMode::MovedFile => self.moved_file_selector(&qualifier, member),
            RewriteMode::OtherFile => self.other_file_selector(&qualifier, operand, member),
        };
        trace!(namespace = %qualifier.namespace, ?decision, "Qualified reference");
        self.apply_selector(operand, member, decision);
    }

    fn moved_file_selector(&mut self, qualifier: &Binding, member: NodeId) -> RewriteDecision {
        if qualifier.namespace.import_path != self.ctx.destination.import_path
            || self.ctx.is_same_namespace()
        {
            return RewriteDecision::Unchanged;
        }
        let name = self
            .tree
            .ident(member)
            .map(|ident| ident.name.clone())
            .unwrap_or_default();
        self.deletion(name)
    }

    fn other_file_selector(
        &mut self,
        qualifier: &Binding,
        operand: NodeId,
        member: NodeId,
    ) -> RewriteDecision {
        if qualifier.namespace.import_path != self.ctx.origin.import_path {
            return RewriteDecision::Unchanged;
        }
        let Some(target) = self.oracle.resolve(self.file, member) else {
            return RewriteDecision::Unchanged;
        };
        if !target.is_declaration_in(&self.ctx.origin) || !self.ctx.symbols.is_moved(&target.name) {
            return RewriteDecision::Unchanged;
        }

        let span = self.tree.span(member);
        if self.ctx.symbols.is_ambiguous(&target.name) {
            self.warn_ambiguous(&target.name, span);
            return RewriteDecision::Unchanged;
        }

        let new_name = self.renamed(&target, span);
        if self.in_destination() {
            return self.deletion(new_name);
        }

        let destination = self.ctx.destination.clone();
        let new_qualifier = self.qualifier_for(&destination);
        let current = self.tree.ident(operand).map(|ident| ident.name.as_str());
        if current == Some(new_qualifier.as_str()) && new_name == target.name {
            return RewriteDecision::Unchanged;
        }
        RewriteDecision::AddQualifier {
            qualifier: new_qualifier,
            name: new_name,
        }
    }

    fn apply_bare(&mut self, id: NodeId, decision: RewriteDecision) {
        self.decisions.record(&decision);
        let Some(ident) = self.tree.ident_mut(id) else {
            return;
        };
        match decision {
            RewriteDecision::Unchanged => return,
            RewriteDecision::AddQualifier { qualifier, name } => {
                ident.qualifier = Some(qualifier);
                ident.name = name;
            }
            RewriteDecision::RenameOnly { name } => ident.name = name,
            // A bare identifier has no qualifier to delete.
            RewriteDecision::RemoveQualifier { .. }
            | RewriteDecision::MarkForTextualDeletion { .. } => return,
        }
        self.modified = true;
    }

    fn apply_selector(&mut self, operand: NodeId, member: NodeId, decision: RewriteDecision) {
        self.decisions.record(&decision);
        let (operand_name, placeholder, member_name) = match decision {
            RewriteDecision::Unchanged => return,
            RewriteDecision::AddQualifier { qualifier, name } => (Some(qualifier), false, name),
            RewriteDecision::RemoveQualifier { name }
            | RewriteDecision::MarkForTextualDeletion { name } => (None, true, name),
            RewriteDecision::RenameOnly { name } => (None, false, name),
        };

        if let Some(ident) = self.tree.ident_mut(operand) {
            if let Some(operand_name) = operand_name {
                ident.name = operand_name;
            }
            ident.placeholder |= placeholder;
        }
        if let Some(ident) = self.tree.ident_mut(member) {
            ident.name = member_name;
        }
        self.modified = true;
    }

    /// Rename-rule result for a moved declaration, warning when an embedded
    /// type changes its name.
    fn renamed(&mut self, binding: &Binding, span: Span) -> String {
        let new_name = self.ctx.rename.apply(&binding.name);
        if binding.is_embedded && new_name != binding.name {
            self.warn_once(
                WarningKind::EmbeddedRename,
                &binding.name,
                span,
                format!(
                    "embedded `{}` becomes `{}`; selectors using the old field name are not rewritten",
                    binding.name, new_name
                ),
            );
        }
        new_name
    }

    fn rename_only(&mut self, binding: &Binding, span: Span) -> RewriteDecision {
        let new_name = self.renamed(binding, span);
        if new_name == binding.name {
            RewriteDecision::Unchanged
        } else {
            RewriteDecision::RenameOnly { name: new_name }
        }
    }

    fn deletion(&self, name: String) -> RewriteDecision {
        match self.ctx.qualifier_deletion {
            QualifierDeletion::Textual => RewriteDecision::MarkForTextualDeletion { name },
            QualifierDeletion::Structural => RewriteDecision::RemoveQualifier { name },
        }
    }

    /// Local name to qualify with, reusing an existing import of the
    /// namespace; records the import as required.
    ///
    /// A name already bound by another import, by a package-level
    /// declaration or by any local of the file is never chosen; the package
    /// name gets a numeric suffix instead.
    fn qualifier_for(&mut self, namespace: &NamespaceId) -> String {
        if let Some(qualifier) = self.required.get(&namespace.import_path) {
            return qualifier.clone();
        }
        let locals = self.oracle.local_names(self.file);
        let qualifier = match self.oracle.import_name(self.file, &namespace.import_path) {
            Some(existing) if !locals.contains(&existing) => existing,
            _ => {
                let mut taken = self.oracle.imported_names(self.file);
                taken.extend(locals);
                for scope in [&self.namespace, self.resulting_namespace()] {
                    taken.extend(self.oracle.declarations(scope).into_iter().map(|d| d.name));
                }
                taken.extend(self.required.values().cloned());
                fresh_name(&namespace.name, &taken)
            }
        };
        trace!(path = %namespace.import_path, %qualifier, "Chose qualifier");
        self.required
            .insert(namespace.import_path.clone(), qualifier.clone());
        qualifier
    }

    /// Whether the file ends up in the destination namespace
    fn in_destination(&self) -> bool {
        self.resulting_namespace().import_path == self.ctx.destination.import_path
    }

    fn resulting_namespace(&self) -> &NamespaceId {
        match self.mode {
            RewriteMode::MovedFile => &self.ctx.destination,
            RewriteMode::OtherFile => &self.namespace,
        }
    }

    fn import_edits(&self) -> ImportEdits {
        let own_path = self.resulting_namespace().import_path.as_str();
        let specs = self.tree.imports();
        let mut edits = ImportEdits::default();

        for (path, qualifier) in &self.required {
            if path == own_path {
                continue;
            }
            let already_named = specs
                .iter()
                .any(|spec| &spec.path == path && self.local_name(spec).as_ref() == Some(qualifier));
            if already_named {
                continue;
            }
            let alias = (*qualifier != default_package_name(path)).then(|| qualifier.clone());
            edits.add.insert(path.clone(), alias);
        }

        let used: HashSet<String> = self
            .tree
            .qualifier_names(|operand| {
                self.oracle
                    .resolve(self.file, operand)
                    .is_some_and(|binding| binding.kind == BindingKind::Namespace)
            })
            .into_iter()
            .collect();

        let migration_paths = [
            self.ctx.origin.import_path.as_str(),
            self.ctx.destination.import_path.as_str(),
        ];
        let mut unused: BTreeSet<&str> = BTreeSet::new();
        let mut needed: BTreeSet<&str> = BTreeSet::new();
        for spec in &specs {
            if spec.path == own_path {
                edits.remove.insert(spec.path.clone());
                continue;
            }
            if !migration_paths.contains(&spec.path.as_str()) {
                continue;
            }
            let still_used = match spec.alias.as_deref() {
                Some("_") => true,
                Some(".") => self.dot_import_used(&spec.path),
                _ => self.local_name(spec).is_some_and(|local| used.contains(&local)),
            };
            if still_used {
                needed.insert(spec.path.as_str());
            } else {
                unused.insert(spec.path.as_str());
            }
        }
        // Removal is by path, so a path imported twice stays while any of
        // its imports is used.
        for path in unused.difference(&needed) {
            edits.remove.insert(path.to_string());
        }
        edits
    }

    /// Name an import binds at file scope; `None` for blank and dot imports.
    fn local_name(&self, spec: &ImportSpec) -> Option<String> {
        match spec.alias.as_deref() {
            Some("_" | ".") => None,
            Some(alias) => Some(alias.to_string()),
            None => Some(self.oracle.package_name(&spec.path)),
        }
    }

    /// Whether a bare reference left in the tree still reaches `path`
    /// through its dot import. Moved names no longer live in the origin.
    fn dot_import_used(&self, path: &str) -> bool {
        let origin = path == self.ctx.origin.import_path;
        self.tree.bare_references().into_iter().any(|id| {
            self.oracle.resolve(self.file, id).is_some_and(|binding| {
                binding.kind == BindingKind::Declaration
                    && binding.namespace.import_path == path
                    && binding.namespace != self.namespace
                    && !(origin && self.ctx.symbols.is_moved(&binding.name))
            })
        })
    }

    fn warn_ambiguous(&mut self, name: &str, span: Span) {
        self.warn_once(
            WarningKind::AmbiguousBinding,
            name,
            span,
            format!(
                "`{}` is declared in both {} and {}; reference left unchanged",
                name, self.ctx.origin, self.ctx.destination
            ),
        );
    }

    fn warn_once(&mut self, kind: WarningKind, name: &str, span: Span, message: String) {
        if self.warned.insert((kind, name.to_string())) {
            self.ctx.warn(MigrationWarning::at(
                kind,
                self.tree.path(),
                name,
                span,
                message,
            ));
        }
    }
}

/// `base`, or the first of `base2`, `base3`, ... not in `taken`.
fn fresh_name(base: &str, taken: &BTreeSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Rewrite one file: convenience wrapper around [`ReferenceRewriter`].
pub fn rewrite_file(
    ctx: &MigrationContext,
    oracle: &dyn BindingOracle,
    file: FileId,
    tree: SyntaxTree,
    mode: RewriteMode,
) -> Result<FileRewrite> {
    Ok(ReferenceRewriter::new(ctx, oracle, file, tree, mode)?.rewrite())
}

#[cfg(test)]
#[path = "rewriter_tests.rs"]
mod tests;
