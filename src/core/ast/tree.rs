//! Arena-backed syntax tree.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Text a qualifier is replaced with when it is scheduled for deletion.
pub const PLACEHOLDER: &str = "SHOULD_BE_DELETED";

/// Stable index of a node inside its [`SyntaxTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Arena slot of this node
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Byte range plus the 1-based line/column of its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// 1-based line of `start`
    pub line: usize,
    /// 1-based byte column of `start`
    pub column: usize,
}

impl Span {
    /// Create a span
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }
}

/// How an identifier occurrence participates in the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentRole {
    /// A use that may resolve to a declaration
    Reference,
    /// The declaring occurrence of a name
    Declaration,
    /// A struct field name or method name
    FieldName,
    /// Right-hand side of `operand.member`
    Member,
    /// The key of a struct-style composite literal element
    CompositeKey,
    /// The name in the package clause
    PackageName,
    /// A statement label
    Label,
}

/// Identifier payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    /// Current spelling (after any rename)
    pub name: String,
    /// Spelling in the source text
    pub original: String,
    /// Qualifier prepended on output (`qualifier.name`)
    pub qualifier: Option<String>,
    /// Rendered as [`PLACEHOLDER`] so the writer can delete it with its dot
    pub placeholder: bool,
    /// Syntactic role
    pub role: IdentRole,
}

impl Ident {
    /// Create an untouched identifier
    pub fn new(name: impl Into<String>, role: IdentRole) -> Self {
        let name = name.into();
        Self {
            original: name.clone(),
            name,
            qualifier: None,
            placeholder: false,
            role,
        }
    }

    /// Whether the rendered text differs from the source text
    pub fn is_changed(&self) -> bool {
        self.placeholder || self.qualifier.is_some() || self.name != self.original
    }

    /// Text this identifier renders as
    pub fn rendered(&self) -> String {
        if self.placeholder {
            return PLACEHOLDER.to_string();
        }
        match &self.qualifier {
            Some(qualifier) => format!("{}.{}", qualifier, self.name),
            None => self.name.clone(),
        }
    }
}

/// One import line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Explicit local name (`alias`, `_` or `.`)
    pub alias: Option<String>,
    /// Unquoted import path
    pub path: String,
    /// Span of the spec itself
    pub span: Span,
    /// Span of the enclosing `import` declaration
    pub decl_span: Span,
    /// Whether the declaration is a parenthesized group
    pub grouped: bool,
}

/// Type constructor shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCtorKind {
    /// `*T`
    Pointer,
    /// `[]T`
    Slice,
    /// `[N]T`
    Array,
    /// `map[K]V`
    Map,
    /// `chan T`
    Chan,
    /// `func(...) ...`
    Func,
    /// `struct { ... }`
    Struct,
    /// `interface { ... }`
    Interface,
}

/// Closed set of node kinds.
///
/// Every construct the rewriter does not need to distinguish is lowered to
/// [`NodeKind::Group`], which only carries its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Source file root
    File {
        /// Package clause identifier
        package: NodeId,
        /// Import specs in source order
        imports: Vec<NodeId>,
        /// Top-level declarations
        decls: Vec<NodeId>,
    },
    /// Import spec
    Import(ImportSpec),
    /// Identifier
    Ident(Ident),
    /// `operand.member`, covering both selector expressions and qualified types
    Selector {
        /// Left-hand side
        operand: NodeId,
        /// Right-hand identifier
        member: NodeId,
    },
    /// Struct field, parameter or type parameter; anonymous when `names` is empty
    Field {
        /// Field names
        names: Vec<NodeId>,
        /// Field type
        ty: Option<NodeId>,
    },
    /// `key: value` inside a composite literal
    KeyedElement {
        /// Key expression or field name
        key: NodeId,
        /// Element value
        value: NodeId,
    },
    /// `T{...}`
    CompositeLit {
        /// Literal type (absent for elided inner literals)
        ty: Option<NodeId>,
        /// Elements
        elements: Vec<NodeId>,
    },
    /// One `var`/`const` spec
    ValueSpec {
        /// Declared names
        names: Vec<NodeId>,
        /// Declared type
        ty: Option<NodeId>,
        /// Initializers
        values: Vec<NodeId>,
    },
    /// One type spec (definition or alias)
    TypeSpec {
        /// Declared name
        name: NodeId,
        /// Type parameter declarations
        type_params: Vec<NodeId>,
        /// Underlying or aliased type
        ty: NodeId,
        /// `type A = B`
        alias: bool,
    },
    /// Function or method declaration
    FuncDecl {
        /// Receiver parameter list
        receiver: Option<NodeId>,
        /// Function name
        name: NodeId,
        /// Type parameter declarations
        type_params: Vec<NodeId>,
        /// Parameters
        params: Vec<NodeId>,
        /// Results
        results: Vec<NodeId>,
        /// Body
        body: Option<NodeId>,
    },
    /// Function literal (closure)
    FuncLit {
        /// Parameters
        params: Vec<NodeId>,
        /// Results
        results: Vec<NodeId>,
        /// Body
        body: NodeId,
    },
    /// Generic instantiation or index expression: `base[args...]`
    Generic {
        /// Instantiated expression
        base: NodeId,
        /// Type arguments or index
        args: Vec<NodeId>,
    },
    /// Type switch statement
    TypeSwitch {
        /// `v` in `switch v := x.(type)`
        alias: Option<NodeId>,
        /// Switched expression
        subject: NodeId,
        /// Case clauses
        clauses: Vec<NodeId>,
    },
    /// `case a, b:` clause
    CaseClause {
        /// Case expressions or types
        exprs: Vec<NodeId>,
        /// Clause statements
        body: Vec<NodeId>,
    },
    /// Pointer/slice/array/map/chan/func/struct/interface type
    TypeCtor {
        /// Constructor shape
        kind: TypeCtorKind,
        /// Element types, lengths, fields or parameters
        operands: Vec<NodeId>,
    },
    /// Any other construct
    Group {
        /// Child nodes in source order
        children: Vec<NodeId>,
    },
}

/// Arena node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Variant payload
    pub kind: NodeKind,
    /// Source range
    pub span: Span,
}

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    path: PathBuf,
    source: String,
    nodes: Vec<Node>,
    root: NodeId,
}

impl SyntaxTree {
    /// Create an empty tree for `path`; the builder must push a `File` node
    /// and call [`SyntaxTree::set_root`].
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
            nodes: Vec::new(),
            root: NodeId(0),
        }
    }

    /// Append a node and return its id
    pub fn push(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, span });
        id
    }

    /// Replace a node's payload (used by builders that reserve a slot first)
    pub fn replace(&mut self, id: NodeId, kind: NodeKind) {
        if let Some(node) = self.nodes.get_mut(id.index()) {
            node.kind = kind;
        }
    }

    /// Mark the root node
    pub fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    /// Root node id
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// File this tree was parsed from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Original source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Borrow a node
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Borrow a node's payload
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|node| &node.kind)
    }

    /// Source range of a node
    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).map(|node| node.span).unwrap_or_default()
    }

    /// Source text covered by a node
    pub fn text(&self, id: NodeId) -> &str {
        let span = self.span(id);
        self.source.get(span.start..span.end).unwrap_or("")
    }

    /// Identifier payload, if `id` is an identifier
    pub fn ident(&self, id: NodeId) -> Option<&Ident> {
        match self.kind(id)? {
            NodeKind::Ident(ident) => Some(ident),
            _ => None,
        }
    }

    /// Mutable identifier payload, if `id` is an identifier
    pub fn ident_mut(&mut self, id: NodeId) -> Option<&mut Ident> {
        match self.nodes.get_mut(id.index()).map(|node| &mut node.kind) {
            Some(NodeKind::Ident(ident)) => Some(ident),
            _ => None,
        }
    }

    /// Package clause identifier
    pub fn package_ident(&self) -> Option<NodeId> {
        match self.kind(self.root)? {
            NodeKind::File { package, .. } => Some(*package),
            _ => None,
        }
    }

    /// Current package name
    pub fn package_name(&self) -> Option<&str> {
        self.package_ident()
            .and_then(|id| self.ident(id))
            .map(|ident| ident.name.as_str())
    }

    /// Import specs in source order
    pub fn imports(&self) -> Vec<&ImportSpec> {
        let Some(NodeKind::File { imports, .. }) = self.kind(self.root) else {
            return Vec::new();
        };
        imports
            .iter()
            .filter_map(|id| match self.kind(*id) {
                Some(NodeKind::Import(spec)) => Some(spec),
                _ => None,
            })
            .collect()
    }

    /// Top-level declaration nodes
    pub fn decls(&self) -> &[NodeId] {
        match self.kind(self.root) {
            Some(NodeKind::File { decls, .. }) => decls,
            _ => &[],
        }
    }

    /// Direct children of a node in source order
    pub fn children(&self, id: NodeId) -> SmallVec<[NodeId; 8]> {
        let mut out = SmallVec::new();
        let Some(kind) = self.kind(id) else {
            return out;
        };

        match kind {
            NodeKind::File {
                package,
                imports,
                decls,
            } => {
                out.push(*package);
                out.extend(imports.iter().copied());
                out.extend(decls.iter().copied());
            }
            NodeKind::Import(_) | NodeKind::Ident(_) => {}
            NodeKind::Selector { operand, member } => {
                out.push(*operand);
                out.push(*member);
            }
            NodeKind::Field { names, ty } => {
                out.extend(names.iter().copied());
                out.extend(ty.iter().copied());
            }
            NodeKind::KeyedElement { key, value } => {
                out.push(*key);
                out.push(*value);
            }
            NodeKind::CompositeLit { ty, elements } => {
                out.extend(ty.iter().copied());
                out.extend(elements.iter().copied());
            }
            NodeKind::ValueSpec { names, ty, values } => {
                out.extend(names.iter().copied());
                out.extend(ty.iter().copied());
                out.extend(values.iter().copied());
            }
            NodeKind::TypeSpec {
                name,
                type_params,
                ty,
                ..
            } => {
                out.push(*name);
                out.extend(type_params.iter().copied());
                out.push(*ty);
            }
            NodeKind::FuncDecl {
                receiver,
                name,
                type_params,
                params,
                results,
                body,
            } => {
                out.extend(receiver.iter().copied());
                out.push(*name);
                out.extend(type_params.iter().copied());
                out.extend(params.iter().copied());
                out.extend(results.iter().copied());
                out.extend(body.iter().copied());
            }
            NodeKind::FuncLit {
                params,
                results,
                body,
            } => {
                out.extend(params.iter().copied());
                out.extend(results.iter().copied());
                out.push(*body);
            }
            NodeKind::Generic { base, args } => {
                out.push(*base);
                out.extend(args.iter().copied());
            }
            NodeKind::TypeSwitch {
                alias,
                subject,
                clauses,
            } => {
                out.extend(alias.iter().copied());
                out.push(*subject);
                out.extend(clauses.iter().copied());
            }
            NodeKind::CaseClause { exprs, body } => {
                out.extend(exprs.iter().copied());
                out.extend(body.iter().copied());
            }
            NodeKind::TypeCtor { operands, .. } => {
                out.extend(operands.iter().copied());
            }
            NodeKind::Group { children } => {
                out.extend(children.iter().copied());
            }
        }
        out
    }

    /// Pre-order traversal from `start`
    pub fn walk<F>(&self, start: NodeId, mut visit: F)
    where
        F: FnMut(NodeId, &Node),
    {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            visit(id, node);
            let children = self.children(id);
            stack.extend(children.into_iter().rev());
        }
    }

    /// All identifiers whose rendered text differs from the source
    pub fn changed_idents(&self) -> Vec<(NodeId, &Ident)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| match &node.kind {
                NodeKind::Ident(ident) if ident.is_changed() => {
                    Some((NodeId(index as u32), ident))
                }
                _ => None,
            })
            .collect()
    }

    /// Selectors whose operand was replaced by the deletion placeholder
    pub fn placeholder_selectors(&self) -> Vec<(NodeId, NodeId)> {
        self.nodes
            .iter()
            .filter_map(|node| match node.kind {
                NodeKind::Selector { operand, member } => {
                    let is_placeholder = self.ident(operand).is_some_and(|i| i.placeholder);
                    is_placeholder.then_some((operand, member))
                }
                _ => None,
            })
            .collect()
    }

    /// Unqualified references: `Reference` identifiers that are not the
    /// member of a selector and carry no added qualifier
    pub fn bare_references(&self) -> Vec<NodeId> {
        let members: HashSet<NodeId> = self
            .nodes
            .iter()
            .filter_map(|node| match node.kind {
                NodeKind::Selector { member, .. } => Some(member),
                _ => None,
            })
            .collect();
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| match &node.kind {
                NodeKind::Ident(ident)
                    if ident.role == IdentRole::Reference
                        && ident.qualifier.is_none()
                        && !ident.placeholder =>
                {
                    Some(NodeId(index as u32))
                }
                _ => None,
            })
            .filter(|id| !members.contains(id))
            .collect()
    }

    /// Local names currently used as qualifiers: selector operands accepted
    /// by `is_namespace`, plus qualifiers added to bare identifiers
    pub fn qualifier_names<F>(&self, is_namespace: F) -> Vec<String>
    where
        F: Fn(NodeId) -> bool,
    {
        let mut names = Vec::new();
        for node in &self.nodes {
            match &node.kind {
                NodeKind::Selector { operand, .. } => {
                    if let Some(ident) = self.ident(*operand) {
                        if !ident.placeholder && is_namespace(*operand) {
                            names.push(ident.name.clone());
                        }
                    }
                }
                NodeKind::Ident(Ident {
                    qualifier: Some(qualifier),
                    ..
                }) => names.push(qualifier.clone()),
                _ => {}
            }
        }
        names
    }
}
