//! Binding records produced by lowering and answered by the oracle.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::ast::{NodeId, Span};

/// Index of a file inside a loaded project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl FileId {
    /// Slot of this file in the project's file list
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A namespace (Go package) identified by its name and import path.
///
/// External test packages (`alpha_test`) share a directory with `alpha` but
/// are distinct namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespaceId {
    /// Package name from the package clause
    pub name: String,
    /// Import path
    pub import_path: String,
}

impl NamespaceId {
    /// Create a namespace id
    pub fn new(name: impl Into<String>, import_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            import_path: import_path.into(),
        }
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.import_path)
    }
}

/// How an identifier node uses its name, as recorded during lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameUse {
    /// Bound by an enclosing function or block scope
    Local,
    /// The declaring occurrence of a top-level name
    Declares,
    /// Resolved at file scope (imports) and then package scope
    Free,
    /// Right-hand side of a selector; meaning depends on the operand
    Member {
        /// Selector operand
        operand: NodeId,
    },
}

/// One identifier occurrence that can bind to something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseSite {
    /// Spelling in the source text
    pub name: String,
    /// How the name is used
    pub kind: NameUse,
    /// Source position
    pub span: Span,
}

/// Kind of a top-level declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    /// `type T ...`
    Type,
    /// `func F(...)`
    Func,
    /// `var V ...`
    Var,
    /// `const C ...`
    Const,
}

/// A top-level declaration found while lowering one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopLevelDecl {
    /// Declared name
    pub name: String,
    /// Declaring identifier node
    pub node: NodeId,
    /// Declaration kind
    pub kind: DeclKind,
}

/// Whether a [`MemberDecl`] is a struct field or a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Named field of a top-level struct type
    Field,
    /// Method with a receiver
    Method,
}

/// A struct field or method declared in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDecl {
    /// Field or method name
    pub name: String,
    /// Name of the struct or receiver base type
    pub owner: String,
    /// Field or method
    pub kind: MemberKind,
    /// Position of the declaring identifier
    pub span: Span,
}

/// One import as seen by name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFact {
    /// Explicit local name, if any
    pub alias: Option<String>,
    /// Import path
    pub path: String,
}

/// Everything lowering learns about one file's names.
#[derive(Debug, Clone, Default)]
pub struct FileFacts {
    /// Package clause name
    pub package: String,
    /// Imports in source order
    pub imports: Vec<ImportFact>,
    /// Every identifier that can bind, keyed by node
    pub uses: HashMap<NodeId, UseSite>,
    /// Type identifiers naming an embedded struct field
    pub embedded: HashSet<NodeId>,
    /// Top-level declarations
    pub decls: Vec<TopLevelDecl>,
    /// Struct fields and methods declared in the file
    pub members: Vec<MemberDecl>,
    /// Bare keys of struct-shaped composite literals
    pub field_keys: Vec<String>,
}

/// A top-level named entity of some namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// Declared name
    pub name: String,
    /// Owning namespace
    pub namespace: NamespaceId,
    /// File that declares it
    pub declaring_file: PathBuf,
    /// Declaration kind
    pub kind: DeclKind,
    /// Whether the name is visible outside its namespace
    pub is_exported: bool,
}

/// What an identifier turned out to denote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    /// An imported namespace used as a qualifier
    Namespace,
    /// A top-level declaration
    Declaration,
    /// A function- or block-scoped binding
    Local,
}

/// Answer of [`BindingOracle::resolve`](super::BindingOracle::resolve).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Binding kind
    pub kind: BindingKind,
    /// Namespace the binding belongs to (the imported one for `Namespace`)
    pub namespace: NamespaceId,
    /// Bound name
    pub name: String,
    /// Declaring file of a top-level declaration
    pub declaring_file: Option<PathBuf>,
    /// Whether the binding is a top-level declaration
    pub is_top_level: bool,
    /// Whether the identifier names an embedded struct field's type
    pub is_embedded: bool,
}

impl Binding {
    /// True for top-level declarations of `namespace`
    pub fn is_declaration_in(&self, namespace: &NamespaceId) -> bool {
        self.kind == BindingKind::Declaration && &self.namespace == namespace
    }

    /// True when the identifier denotes the namespace with `import_path`
    pub fn is_namespace(&self, import_path: &str) -> bool {
        self.kind == BindingKind::Namespace && self.namespace.import_path == import_path
    }
}

/// Go's export rule: the first character is an upper-case letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}
