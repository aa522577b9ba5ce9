//! Project-wide name resolution for Go.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::types::{
    is_exported, Binding, BindingKind, Declaration, FileFacts, FileId, MemberDecl, NameUse,
    NamespaceId, UseSite,
};
use super::BindingOracle;
use crate::core::ast::NodeId;

/// Local names a file's imports introduce.
#[derive(Debug, Clone, Default)]
struct FileImports {
    /// Local name -> import path
    named: HashMap<String, String>,
    /// Dot imports, whose exported names join file scope
    dotted: Vec<String>,
}

#[derive(Debug, Clone)]
struct FileEntry {
    path: PathBuf,
    namespace: NamespaceId,
    facts: FileFacts,
    imports: FileImports,
}

/// Name resolution over every parsed file of a project.
///
/// Build it with [`ProjectIndex::insert`] for each file, then call
/// [`ProjectIndex::finish`] to compute import local names (they depend on the
/// package names of every namespace).
#[derive(Debug, Clone, Default)]
pub struct ProjectIndex {
    files: Vec<Option<FileEntry>>,
    namespaces: IndexMap<NamespaceId, IndexMap<String, Declaration>>,
    by_import_path: HashMap<String, NamespaceId>,
}

impl ProjectIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one lowered file.
    pub fn insert(&mut self, id: FileId, path: PathBuf, namespace: NamespaceId, facts: FileFacts) {
        let decls = self.namespaces.entry(namespace.clone()).or_default();
        for decl in &facts.decls {
            // Blank identifiers and `init` are never referable.
            if decl.name == "_" || decl.name == "init" {
                continue;
            }
            decls.entry(decl.name.clone()).or_insert_with(|| Declaration {
                name: decl.name.clone(),
                namespace: namespace.clone(),
                declaring_file: path.clone(),
                kind: decl.kind,
                is_exported: is_exported(&decl.name),
            });
        }

        if !namespace.name.ends_with("_test") || !namespace.import_path.ends_with("_test") {
            self.by_import_path
                .entry(namespace.import_path.clone())
                .or_insert_with(|| namespace.clone());
        }

        if self.files.len() <= id.index() {
            self.files.resize(id.index() + 1, None);
        }
        self.files[id.index()] = Some(FileEntry {
            path,
            namespace,
            facts,
            imports: FileImports::default(),
        });
    }

    /// Compute every file's import local names.
    pub fn finish(mut self) -> Self {
        let package_names: HashMap<String, String> = self
            .by_import_path
            .iter()
            .map(|(path, ns)| (path.clone(), ns.name.clone()))
            .collect();

        for entry in self.files.iter_mut().flatten() {
            let mut imports = FileImports::default();
            for import in &entry.facts.imports {
                match import.alias.as_deref() {
                    Some("_") => {}
                    Some(".") => imports.dotted.push(import.path.clone()),
                    Some(alias) => {
                        imports.named.insert(alias.to_string(), import.path.clone());
                    }
                    None => {
                        let name = package_names
                            .get(&import.path)
                            .cloned()
                            .unwrap_or_else(|| default_package_name(&import.path));
                        imports.named.insert(name, import.path.clone());
                    }
                }
            }
            entry.imports = imports;
        }

        debug!(
            files = self.files.iter().flatten().count(),
            namespaces = self.namespaces.len(),
            "Built project index"
        );
        self
    }

    fn entry(&self, file: FileId) -> Option<&FileEntry> {
        self.files.get(file.index()).and_then(Option::as_ref)
    }

    /// Path of an indexed file
    pub fn path(&self, file: FileId) -> Option<&Path> {
        self.entry(file).map(|entry| entry.path.as_path())
    }

    /// Indexed files, in id order
    pub fn file_ids(&self) -> impl Iterator<Item = FileId> + '_ {
        self.files
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_some())
            .map(|(index, _)| FileId(index as u32))
    }

    /// Files belonging to `namespace`
    pub fn files_in<'a>(&'a self, namespace: &'a NamespaceId) -> impl Iterator<Item = FileId> + 'a {
        self.file_ids()
            .filter(move |id| self.entry(*id).is_some_and(|entry| &entry.namespace == namespace))
    }

    /// Every recorded use site of a file
    pub fn uses(&self, file: FileId) -> impl Iterator<Item = (NodeId, &UseSite)> + '_ {
        self.entry(file)
            .into_iter()
            .flat_map(|entry| entry.facts.uses.iter().map(|(id, site)| (*id, site)))
    }

    /// Struct fields and methods declared in a file
    pub fn members(&self, file: FileId) -> &[MemberDecl] {
        self.entry(file).map_or(&[], |entry| entry.facts.members.as_slice())
    }

    /// Bare struct-literal keys written in a file
    pub fn field_keys(&self, file: FileId) -> &[String] {
        self.entry(file).map_or(&[], |entry| entry.facts.field_keys.as_slice())
    }

    /// Namespace (test packages excluded) living at `import_path`
    pub fn namespace_at(&self, import_path: &str) -> Option<&NamespaceId> {
        self.by_import_path.get(import_path)
    }

    /// Known namespaces
    pub fn namespaces(&self) -> impl Iterator<Item = &NamespaceId> {
        self.namespaces.keys()
    }

    fn declaration(&self, namespace: &NamespaceId, name: &str) -> Option<&Declaration> {
        self.namespaces.get(namespace)?.get(name)
    }

    fn declaration_binding(
        &self,
        namespace: &NamespaceId,
        name: &str,
        is_embedded: bool,
    ) -> Option<Binding> {
        let decl = self.declaration(namespace, name)?;
        Some(Binding {
            kind: BindingKind::Declaration,
            namespace: decl.namespace.clone(),
            name: decl.name.clone(),
            declaring_file: Some(decl.declaring_file.clone()),
            is_top_level: true,
            is_embedded,
        })
    }

    fn namespace_binding(&self, local_name: &str, import_path: &str) -> Binding {
        let namespace = self
            .by_import_path
            .get(import_path)
            .cloned()
            .unwrap_or_else(|| NamespaceId::new(default_package_name(import_path), import_path));
        Binding {
            kind: BindingKind::Namespace,
            namespace,
            name: local_name.to_string(),
            declaring_file: None,
            is_top_level: false,
            is_embedded: false,
        }
    }

    fn resolve_free(&self, entry: &FileEntry, name: &str, is_embedded: bool) -> Option<Binding> {
        if let Some(path) = entry.imports.named.get(name) {
            return Some(self.namespace_binding(name, path));
        }
        if let Some(binding) = self.declaration_binding(&entry.namespace, name, is_embedded) {
            return Some(binding);
        }
        entry.imports.dotted.iter().find_map(|path| {
            let namespace = self.by_import_path.get(path)?;
            self.declaration_binding(namespace, name, is_embedded)
                .filter(|_| is_exported(name))
        })
    }
}

impl BindingOracle for ProjectIndex {
    fn resolve(&self, file: FileId, node: NodeId) -> Option<Binding> {
        let entry = self.entry(file)?;
        let site = entry.facts.uses.get(&node)?;
        let is_embedded = entry.facts.embedded.contains(&node);

        let binding = match site.kind {
            NameUse::Local => Some(Binding {
                kind: BindingKind::Local,
                namespace: entry.namespace.clone(),
                name: site.name.clone(),
                declaring_file: None,
                is_top_level: false,
                is_embedded,
            }),
            NameUse::Declares => self.declaration_binding(&entry.namespace, &site.name, is_embedded),
            NameUse::Free => self.resolve_free(entry, &site.name, is_embedded),
            NameUse::Member { operand } => {
                let qualifier = self.resolve(file, operand)?;
                if qualifier.kind != BindingKind::Namespace {
                    return None;
                }
                self.declaration_binding(&qualifier.namespace, &site.name, is_embedded)
            }
        };
        trace!(file = %entry.path.display(), name = %site.name, ?binding, "Resolved identifier");
        binding
    }

    fn declarations(&self, namespace: &NamespaceId) -> Vec<Declaration> {
        self.namespaces
            .get(namespace)
            .map(|decls| decls.values().cloned().collect())
            .unwrap_or_default()
    }

    fn namespace_of(&self, file: FileId) -> Option<NamespaceId> {
        self.entry(file).map(|entry| entry.namespace.clone())
    }

    fn import_name(&self, file: FileId, import_path: &str) -> Option<String> {
        let entry = self.entry(file)?;
        entry
            .imports
            .named
            .iter()
            .filter(|(_, path)| path.as_str() == import_path)
            .map(|(name, _)| name.clone())
            .min()
    }

    fn imported_names(&self, file: FileId) -> BTreeSet<String> {
        self.entry(file)
            .map(|entry| entry.imports.named.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn local_names(&self, file: FileId) -> BTreeSet<String> {
        self.uses(file)
            .filter(|(_, site)| site.kind == NameUse::Local && site.name != "_")
            .map(|(_, site)| site.name.clone())
            .collect()
    }

    fn package_name(&self, import_path: &str) -> String {
        self.by_import_path
            .get(import_path)
            .map(|ns| ns.name.clone())
            .unwrap_or_else(|| default_package_name(import_path))
    }
}

/// The package name Go tooling assumes for an import path: the last path
/// element, skipping a `vN` major-version element, with a `go-` prefix and
/// anything from the first non-identifier character removed.
pub fn default_package_name(import_path: &str) -> String {
    let mut elements = import_path.rsplit('/').filter(|e| !e.is_empty());
    let mut last = elements.next().unwrap_or(import_path);
    if is_major_version(last) {
        if let Some(previous) = elements.next() {
            last = previous;
        }
    }
    let last = last.strip_prefix("go-").unwrap_or(last);
    let name: String = last
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        last.to_string()
    } else {
        name
    }
}

fn is_major_version(element: &str) -> bool {
    element
        .strip_prefix('v')
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::go::GoAdapter;
    use crate::core::ast::IdentRole;
    use crate::core::ast::NodeKind;

    struct Fixture {
        index: ProjectIndex,
        trees: Vec<crate::core::ast::SyntaxTree>,
    }

    impl Fixture {
        fn new(files: &[(&str, &str, &str)]) -> Self {
            let mut adapter = GoAdapter::new().unwrap();
            let mut index = ProjectIndex::new();
            let mut trees = Vec::new();
            for (i, (path, import_path, source)) in files.iter().enumerate() {
                let lowered = adapter
                    .lower_file(Path::new(path), source.to_string())
                    .unwrap();
                let namespace = NamespaceId::new(lowered.facts.package.clone(), *import_path);
                index.insert(FileId(i as u32), PathBuf::from(path), namespace, lowered.facts);
                trees.push(lowered.tree);
            }
            Self {
                index: index.finish(),
                trees,
            }
        }

        /// Bindings of every occurrence of `name` in file `file`, in source order.
        fn bindings(&self, file: usize, name: &str) -> Vec<Option<Binding>> {
            let tree = &self.trees[file];
            let mut found = Vec::new();
            tree.walk(tree.root(), |id, node| {
                if let NodeKind::Ident(ident) = &node.kind {
                    if ident.original == name && ident.role != IdentRole::PackageName {
                        found.push((node.span.start, id));
                    }
                }
            });
            found.sort();
            found
                .into_iter()
                .map(|(_, id)| self.index.resolve(FileId(file as u32), id))
                .collect()
        }
    }

    fn shop() -> Fixture {
        Fixture::new(&[
            (
                "/shop/alpha/widget.go",
                "example.com/shop/alpha",
                "package alpha\n\ntype Widget struct{}\n\nfunc NewWidget() *Widget { return &Widget{} }\n\nfunc use() { _ = Helper() }\n",
            ),
            (
                "/shop/alpha/helper.go",
                "example.com/shop/alpha",
                "package alpha\n\nfunc Helper() int { return 1 }\n\ntype Holder struct {\n\tWidget\n\tw Widget\n}\n",
            ),
            (
                "/shop/gamma/main.go",
                "example.com/shop/gamma",
                "package gamma\n\nimport (\n\t\"fmt\"\n\tal \"example.com/shop/alpha\"\n)\n\nfunc Run() {\n\tfmt.Println(al.NewWidget())\n\tal := 3\n\t_ = al\n}\n",
            ),
        ])
    }

    #[test]
    fn declarations_are_grouped_by_namespace() {
        let fixture = shop();
        let alpha = NamespaceId::new("alpha", "example.com/shop/alpha");
        let names: Vec<String> = fixture
            .index
            .declarations(&alpha)
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["Widget", "NewWidget", "use", "Helper", "Holder"]);
        assert_eq!(fixture.index.files_in(&alpha).count(), 2);
        assert_eq!(fixture.index.package_name("example.com/shop/alpha"), "alpha");
    }

    #[test]
    fn package_scope_names_resolve_across_files() {
        let fixture = shop();
        let helper = fixture.bindings(0, "Helper");
        let binding = helper[0].as_ref().unwrap();
        assert_eq!(binding.kind, BindingKind::Declaration);
        assert_eq!(
            binding.declaring_file.as_deref(),
            Some(Path::new("/shop/alpha/helper.go"))
        );

        let widget = fixture.bindings(1, "Widget");
        assert_eq!(widget.len(), 2);
        assert!(widget[0].as_ref().unwrap().is_embedded);
        assert!(!widget[1].as_ref().unwrap().is_embedded);
    }

    #[test]
    fn qualifiers_resolve_to_namespaces_unless_shadowed() {
        let fixture = shop();
        let al = fixture.bindings(2, "al");
        assert!(al[0].as_ref().unwrap().is_namespace("example.com/shop/alpha"));
        assert_eq!(al[1].as_ref().unwrap().kind, BindingKind::Local);
        assert_eq!(al[2].as_ref().unwrap().kind, BindingKind::Local);

        let new_widget = fixture.bindings(2, "NewWidget");
        let binding = new_widget[0].as_ref().unwrap();
        assert_eq!(binding.namespace.name, "alpha");
        assert_eq!(binding.kind, BindingKind::Declaration);

        // Packages outside the project resolve as namespaces, their members do not.
        let fmt = fixture.bindings(2, "fmt");
        assert!(fmt[0].as_ref().unwrap().is_namespace("fmt"));
        assert_eq!(fixture.bindings(2, "Println"), vec![None]);
    }

    #[test]
    fn import_names_honour_aliases() {
        let fixture = shop();
        assert_eq!(
            fixture.index.import_name(FileId(2), "example.com/shop/alpha"),
            Some("al".to_string())
        );
        assert_eq!(fixture.index.import_name(FileId(2), "fmt"), Some("fmt".to_string()));
        assert_eq!(fixture.index.import_name(FileId(0), "fmt"), None);
    }

    #[test]
    fn file_scope_and_local_names() {
        let fixture = shop();
        let imported: Vec<String> = fixture.index.imported_names(FileId(2)).into_iter().collect();
        assert_eq!(imported, vec!["al", "fmt"]);

        let locals: Vec<String> = fixture.index.local_names(FileId(2)).into_iter().collect();
        assert_eq!(locals, vec!["al"]);
        assert!(fixture.index.local_names(FileId(1)).is_empty());
    }

    #[test]
    fn default_package_names() {
        assert_eq!(default_package_name("example.com/shop/alpha"), "alpha");
        assert_eq!(default_package_name("gopkg.in/yaml.v3"), "yaml");
        assert_eq!(default_package_name("github.com/google/go-cmp/cmp"), "cmp");
        assert_eq!(default_package_name("github.com/org/go-github"), "github");
        assert_eq!(default_package_name("example.com/mod/v2"), "mod");
        assert_eq!(default_package_name("fmt"), "fmt");
    }
}
