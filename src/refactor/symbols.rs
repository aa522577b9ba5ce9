//! Moved/retained partition of the origin namespace.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::config::RenameRule;
use crate::oracle::Declaration;

/// Exported top-level names of the origin namespace, split by whether they
/// leave with the moved file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSet {
    /// Declared in the moved file
    pub moved: BTreeSet<String>,
    /// Declared in the origin namespace's other files
    pub retained: BTreeSet<String>,
    /// Moved names whose new spelling is already declared in the destination
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub ambiguous: BTreeSet<String>,
}

impl SymbolSet {
    /// Partition the exported declarations of one namespace.
    ///
    /// Anything declared in `moved_file` is moved; everything else is
    /// retained. A name is claimed by the first declaration seen, so the
    /// two sets stay disjoint even for malformed input.
    pub fn classify<'a, I>(declarations: I, moved_file: &Path) -> Self
    where
        I: IntoIterator<Item = &'a Declaration>,
    {
        let mut set = Self::default();
        for decl in declarations.into_iter().filter(|d| d.is_exported) {
            if set.contains(&decl.name) {
                continue;
            }
            if decl.declaring_file == moved_file {
                set.moved.insert(decl.name.clone());
            } else {
                set.retained.insert(decl.name.clone());
            }
        }
        debug!(moved = set.moved.len(), retained = set.retained.len(), "Classified symbols");
        set
    }

    /// Mark moved names that would collide with declarations already in the
    /// destination namespace (ignoring those that come from `moved_file`).
    pub fn with_collisions<'a, I>(mut self, destination: I, rename: &RenameRule, moved_file: &Path) -> Self
    where
        I: IntoIterator<Item = &'a Declaration>,
    {
        let existing: BTreeSet<&str> = destination
            .into_iter()
            .filter(|d| d.declaring_file != moved_file)
            .map(|d| d.name.as_str())
            .collect();

        self.ambiguous = self
            .moved
            .iter()
            .filter(|name| existing.contains(rename.apply(name).as_str()))
            .cloned()
            .collect();
        self
    }

    /// Whether a name moves with the file
    pub fn is_moved(&self, name: &str) -> bool {
        self.moved.contains(name)
    }

    /// Whether a name stays in the origin namespace
    pub fn is_retained(&self, name: &str) -> bool {
        self.retained.contains(name)
    }

    /// Whether references to a name must be left alone
    pub fn is_ambiguous(&self, name: &str) -> bool {
        self.ambiguous.contains(name)
    }

    /// Whether a name is in either set
    pub fn contains(&self, name: &str) -> bool {
        self.is_moved(name) || self.is_retained(name)
    }

    /// Whether both sets are empty
    pub fn is_empty(&self) -> bool {
        self.moved.is_empty() && self.retained.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{DeclKind, NamespaceId};
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn decl(name: &str, file: &str) -> Declaration {
        Declaration {
            name: name.to_string(),
            namespace: NamespaceId::new("alpha", "example.com/shop/alpha"),
            declaring_file: PathBuf::from(file),
            kind: DeclKind::Func,
            is_exported: crate::oracle::is_exported(name),
        }
    }

    #[test]
    fn partitions_by_declaring_file() {
        let decls = vec![
            decl("Widget", "/a/widget.go"),
            decl("NewWidget", "/a/widget.go"),
            decl("helper", "/a/widget.go"),
            decl("Helper", "/a/helper.go"),
        ];
        let set = SymbolSet::classify(&decls, Path::new("/a/widget.go"));

        assert_eq!(
            set.moved.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["NewWidget", "Widget"]
        );
        assert!(set.is_retained("Helper"));
        assert!(!set.contains("helper"));
        assert!(!set.is_empty());
    }

    #[test]
    fn empty_namespace_gives_empty_set() {
        let set = SymbolSet::classify(&[], Path::new("/a/widget.go"));
        assert!(set.is_empty());
    }

    #[test]
    fn collisions_use_renamed_spelling() {
        let decls = vec![decl("Widget", "/a/widget.go"), decl("Gadget", "/a/widget.go")];
        let destination = vec![decl("idget", "/b/existing.go"), decl("Gadget", "/a/widget.go")];
        let set = SymbolSet::classify(&decls, Path::new("/a/widget.go")).with_collisions(
            &destination,
            &RenameRule::new("", "W"),
            Path::new("/a/widget.go"),
        );

        assert!(set.is_ambiguous("Widget"));
        assert!(!set.is_ambiguous("Gadget"));
    }

    proptest! {
        /// Property: moved and retained never share a name
        #[test]
        fn prop_classification_is_disjoint(
            entries in proptest::collection::vec(("[A-Z][a-z]{0,3}", 0usize..4), 0..40)
        ) {
            let decls: Vec<Declaration> = entries
                .iter()
                .map(|(name, file)| decl(name, &format!("/a/f{file}.go")))
                .collect();
            let set = SymbolSet::classify(&decls, Path::new("/a/f0.go"));

            prop_assert!(set.moved.is_disjoint(&set.retained));
            for d in &decls {
                prop_assert!(set.contains(&d.name));
            }
        }
    }
}
