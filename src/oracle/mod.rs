//! Binding oracle: what does an identifier denote?
//!
//! The rewriter never inspects names on its own. Every decision starts with a
//! [`BindingOracle::resolve`] call, which answers from facts recorded while
//! the file was lowered, so the answer for a node does not change while the
//! tree is being rewritten.
//!
//! [`ProjectIndex`] is the implementation for Go projects.

pub mod index;
pub mod types;

use std::collections::BTreeSet;

use crate::core::ast::NodeId;

pub use index::{default_package_name, ProjectIndex};
pub use types::{
    is_exported, Binding, BindingKind, DeclKind, Declaration, FileFacts, FileId, ImportFact,
    MemberDecl, MemberKind, NameUse, NamespaceId, TopLevelDecl, UseSite,
};

/// Resolves identifier nodes of a loaded project.
///
/// Implementations must be safe to query from every worker at once.
pub trait BindingOracle: Send + Sync {
    /// What the identifier `node` of `file` denotes, if it binds to anything
    /// the project knows about.
    fn resolve(&self, file: FileId, node: NodeId) -> Option<Binding>;

    /// Top-level declarations of a namespace, in declaration order.
    fn declarations(&self, namespace: &NamespaceId) -> Vec<Declaration>;

    /// Namespace a file belongs to.
    fn namespace_of(&self, file: FileId) -> Option<NamespaceId>;

    /// Local name under which `file` imports `import_path`.
    fn import_name(&self, file: FileId, import_path: &str) -> Option<String>;

    /// Every name `file`'s imports bind at file scope.
    fn imported_names(&self, file: FileId) -> BTreeSet<String>;

    /// Names bound by function or block scopes anywhere in `file`.
    fn local_names(&self, file: FileId) -> BTreeSet<String>;

    /// Package name of the namespace at `import_path`, falling back to the
    /// name derived from the path itself.
    fn package_name(&self, import_path: &str) -> String {
        default_package_name(import_path)
    }
}
