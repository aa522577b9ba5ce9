//! Go language adapter with tree-sitter integration.
//!
//! Parses Go source with tree-sitter and lowers the concrete syntax tree into
//! the arena [`SyntaxTree`]. While lowering, a stack of lexical scopes decides
//! for every identifier whether it is locally bound or must be resolved at
//! file/package scope; the result is recorded in [`FileFacts`] for the oracle.

use std::collections::HashSet;
use std::path::Path;

use tree_sitter::{Node, Parser, Tree};

use super::registry::create_parser_for_language;
use crate::core::ast::{
    Ident, IdentRole, ImportSpec, NodeId, NodeKind, Span, SyntaxTree, TypeCtorKind,
};
use crate::core::errors::{PkgshiftError, Result};
use crate::oracle::types::{
    DeclKind, FileFacts, ImportFact, MemberDecl, MemberKind, NameUse, TopLevelDecl, UseSite,
};

/// A parsed and lowered Go file.
#[derive(Debug, Clone)]
pub struct LoweredFile {
    /// Arena syntax tree
    pub tree: SyntaxTree,
    /// Name-resolution record for the oracle
    pub facts: FileFacts,
}

/// Go-specific parsing and lowering
pub struct GoAdapter {
    /// Tree-sitter parser for Go
    parser: Parser,
}

impl GoAdapter {
    /// Create a new Go adapter
    pub fn new() -> Result<Self> {
        let parser = create_parser_for_language("go")?;
        Ok(Self { parser })
    }

    fn parse_tree(&mut self, source_code: &str, path: &Path) -> Result<Tree> {
        self.parser.parse(source_code, None).ok_or_else(|| {
            PkgshiftError::parse_with_location(
                "go",
                "Failed to parse Go source",
                path.display().to_string(),
                None,
                None,
            )
        })
    }

    /// Parse and lower one file. Any syntax error makes the whole file a
    /// [`PkgshiftError::Parse`].
    pub fn lower_file(&mut self, path: &Path, source: String) -> Result<LoweredFile> {
        let ts_tree = self.parse_tree(&source, path)?;
        let root = ts_tree.root_node();

        if root.has_error() {
            let (line, column) = first_error(root)
                .map(|node| {
                    let pos = node.start_position();
                    (pos.row + 1, pos.column + 1)
                })
                .unwrap_or((1, 1));
            return Err(PkgshiftError::parse_with_location(
                "go",
                format!("syntax error at {}:{}", line, column),
                path.display().to_string(),
                Some(line),
                Some(column),
            ));
        }

        let mut lowerer = Lowerer::new(path, &source);
        lowerer.file(root)?;
        Ok(lowerer.finish())
    }
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error() || child.is_missing())
        .find_map(first_error)
}

fn span_of(node: Node) -> Span {
    let pos = node.start_position();
    Span::new(node.start_byte(), node.end_byte(), pos.row + 1, pos.column + 1)
}

fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|child| child.kind() == token);
    found
}

/// Strip pointer and parenthesis wrappers from a type node.
fn unwrap_type(mut node: Node) -> Node {
    while matches!(node.kind(), "pointer_type" | "parenthesized_type") {
        match named_children(node).into_iter().next() {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

/// Keys of map, slice and array literals are expressions; any other literal
/// is struct-shaped and its bare keys are field names.
fn keys_are_expressions(ty: Option<Node>) -> bool {
    ty.map(unwrap_type).is_some_and(|ty| {
        matches!(
            ty.kind(),
            "map_type" | "slice_type" | "array_type" | "implicit_length_array_type"
        )
    })
}

/// Element type of a map/slice/array type, used for elided inner literals.
fn element_type(ty: Option<Node>) -> Option<Node> {
    let ty = unwrap_type(ty?);
    match ty.kind() {
        "map_type" => ty.child_by_field_name("value"),
        "slice_type" | "array_type" | "implicit_length_array_type" => {
            ty.child_by_field_name("element")
        }
        _ => None,
    }
}

const SKIPPED_KINDS: &[&str] = &[
    "comment",
    "int_literal",
    "float_literal",
    "imaginary_literal",
    "rune_literal",
    "interpreted_string_literal",
    "raw_string_literal",
    "true",
    "false",
    "nil",
    "iota",
    "package_clause",
    "import_declaration",
    "empty_statement",
    "fallthrough_statement",
];

struct Lowerer<'s> {
    source: &'s str,
    tree: SyntaxTree,
    scopes: Vec<HashSet<String>>,
    facts: FileFacts,
}

impl<'s> Lowerer<'s> {
    fn new(path: &Path, source: &'s str) -> Self {
        Self {
            source,
            tree: SyntaxTree::new(path, source),
            scopes: Vec::new(),
            facts: FileFacts::default(),
        }
    }

    fn finish(self) -> LoweredFile {
        LoweredFile {
            tree: self.tree,
            facts: self.facts,
        }
    }

    fn text(&self, node: Node) -> &'s str {
        self.source.get(node.start_byte()..node.end_byte()).unwrap_or("")
    }

    fn at_top_level(&self) -> bool {
        self.scopes.is_empty()
    }

    fn is_local(&self, name: &str) -> bool {
        name == "_" || self.scopes.iter().rev().any(|scope| scope.contains(name))
    }

    fn bind_local(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn group(&mut self, node: Node, children: Vec<NodeId>) -> NodeId {
        self.tree.push(NodeKind::Group { children }, span_of(node))
    }

    fn ident(&mut self, node: Node, role: IdentRole) -> NodeId {
        let name = self.text(node);
        self.tree
            .push(NodeKind::Ident(Ident::new(name, role)), span_of(node))
    }

    fn record_use(&mut self, id: NodeId, node: Node, kind: NameUse) {
        let site = UseSite {
            name: self.text(node).to_string(),
            kind,
            span: span_of(node),
        };
        self.facts.uses.insert(id, site);
    }

    fn reference(&mut self, node: Node) -> NodeId {
        let kind = if self.is_local(self.text(node)) {
            NameUse::Local
        } else {
            NameUse::Free
        };
        let id = self.ident(node, IdentRole::Reference);
        self.record_use(id, node, kind);
        id
    }

    fn declare_local(&mut self, node: Node) -> NodeId {
        let name = self.text(node);
        self.bind_local(name);
        let id = self.ident(node, IdentRole::Declaration);
        self.record_use(id, node, NameUse::Local);
        id
    }

    fn declare_top(&mut self, node: Node, kind: DeclKind) -> NodeId {
        let name = self.text(node);
        let id = self.ident(node, IdentRole::Declaration);
        if name != "_" {
            self.record_use(id, node, NameUse::Declares);
            self.facts.decls.push(TopLevelDecl {
                name: name.to_string(),
                node: id,
                kind,
            });
        }
        id
    }

    fn declare(&mut self, node: Node, kind: DeclKind) -> NodeId {
        if self.at_top_level() {
            self.declare_top(node, kind)
        } else {
            self.declare_local(node)
        }
    }

    fn lower_all(&mut self, nodes: Vec<Node>) -> Vec<NodeId> {
        nodes
            .into_iter()
            .filter_map(|node| self.lower(node))
            .collect()
    }

    fn lower_or_empty(&mut self, node: Node) -> NodeId {
        match self.lower(node) {
            Some(id) => id,
            None => self.group(node, Vec::new()),
        }
    }

    fn scoped<T>(&mut self, body: impl FnOnce(&mut Self) -> T) -> T {
        self.scopes.push(HashSet::new());
        let result = body(self);
        self.scopes.pop();
        result
    }

    fn file(&mut self, root: Node) -> Result<()> {
        let mut package = None;
        let mut imports = Vec::new();
        let mut decls = Vec::new();

        for child in named_children(root) {
            match child.kind() {
                "package_clause" => {
                    if let Some(name) = named_children(child).into_iter().next() {
                        let id = self.ident(name, IdentRole::PackageName);
                        self.facts.package = self.text(name).to_string();
                        package = Some(id);
                    }
                }
                "import_declaration" => imports.extend(self.import_declaration(child)),
                _ => decls.extend(self.lower(child)),
            }
        }

        let package = package.ok_or_else(|| {
            PkgshiftError::parse_with_location(
                "go",
                "missing package clause",
                self.tree.path().display().to_string(),
                Some(1),
                Some(1),
            )
        })?;

        let root_id = self.tree.push(
            NodeKind::File {
                package,
                imports,
                decls,
            },
            span_of(root),
        );
        self.tree.set_root(root_id);
        Ok(())
    }

    fn import_declaration(&mut self, decl: Node) -> Vec<NodeId> {
        let decl_span = span_of(decl);
        let mut specs = Vec::new();
        let mut grouped = false;
        for child in named_children(decl) {
            match child.kind() {
                "import_spec" => specs.push(child),
                "import_spec_list" => {
                    grouped = true;
                    specs.extend(
                        named_children(child)
                            .into_iter()
                            .filter(|spec| spec.kind() == "import_spec"),
                    );
                }
                _ => {}
            }
        }

        let mut ids = Vec::new();
        for spec in specs {
            let Some(path_node) = spec.child_by_field_name("path") else {
                continue;
            };
            let path = self
                .text(path_node)
                .trim_matches(|c| c == '"' || c == '`')
                .to_string();
            let alias = spec
                .child_by_field_name("name")
                .map(|name| self.text(name).to_string());

            self.facts.imports.push(ImportFact {
                alias: alias.clone(),
                path: path.clone(),
            });
            ids.push(self.tree.push(
                NodeKind::Import(ImportSpec {
                    alias,
                    path,
                    span: span_of(spec),
                    decl_span,
                    grouped,
                }),
                span_of(spec),
            ));
        }
        ids
    }

    fn lower(&mut self, node: Node) -> Option<NodeId> {
        let kind = node.kind();
        if SKIPPED_KINDS.contains(&kind) || !node.is_named() {
            return None;
        }

        let id = match kind {
            "identifier" | "type_identifier" | "package_identifier" => self.reference(node),
            "blank_identifier" => self.ident(node, IdentRole::Reference),
            "field_identifier" => self.ident(node, IdentRole::FieldName),
            "label_name" => self.ident(node, IdentRole::Label),
            "selector_expression" => self.selector(node, "operand", "field")?,
            "qualified_type" => self.selector(node, "package", "name")?,
            "composite_literal" => self.composite_literal(node),
            "literal_value" => self.literal_value(node, None),
            "field_declaration" => self.field_declaration(node),
            "generic_type" => self.generic_type(node)?,
            "index_expression" => self.index_expression(node)?,
            "pointer_type" => self.type_ctor(node, TypeCtorKind::Pointer),
            "slice_type" => self.type_ctor(node, TypeCtorKind::Slice),
            "array_type" | "implicit_length_array_type" => {
                self.type_ctor(node, TypeCtorKind::Array)
            }
            "map_type" => self.type_ctor(node, TypeCtorKind::Map),
            "channel_type" => self.type_ctor(node, TypeCtorKind::Chan),
            "struct_type" => self.type_ctor(node, TypeCtorKind::Struct),
            "interface_type" => self.type_ctor(node, TypeCtorKind::Interface),
            "function_type" => self.function_type(node),
            "func_literal" => self.func_literal(node),
            "function_declaration" | "method_declaration" => self.function_declaration(node)?,
            "method_elem" | "method_spec" => self.method_elem(node),
            "type_spec" | "type_alias" => self.type_spec(node)?,
            "const_spec" => self.value_spec(node, DeclKind::Const),
            "var_spec" => self.value_spec(node, DeclKind::Var),
            "short_var_declaration" => self.short_var_declaration(node),
            "range_clause" | "receive_statement" => self.maybe_declaring_assignment(node),
            "type_switch_statement" => self.type_switch(node),
            "expression_case" => self.case_clause(node, "value"),
            "communication_case" => self.case_clause(node, "communication"),
            "default_case" => self.case_clause(node, ""),
            "parameter_declaration" | "variadic_parameter_declaration" => {
                self.parameter(node)
            }
            "block" | "for_statement" | "if_statement" | "expression_switch_statement"
            | "select_statement" => self.scoped(|this| {
                let children = this.lower_all(named_children(node));
                this.group(node, children)
            }),
            _ => {
                let children = self.lower_all(named_children(node));
                if children.is_empty() {
                    return None;
                }
                self.group(node, children)
            }
        };
        Some(id)
    }

    fn selector(&mut self, node: Node, operand_field: &str, member_field: &str) -> Option<NodeId> {
        let operand_node = node.child_by_field_name(operand_field)?;
        let member_node = node.child_by_field_name(member_field)?;

        let operand = self.lower_or_empty(operand_node);
        let member = self.ident(member_node, IdentRole::Member);
        self.record_use(member, member_node, NameUse::Member { operand });

        Some(
            self.tree
                .push(NodeKind::Selector { operand, member }, span_of(node)),
        )
    }

    fn composite_literal(&mut self, node: Node) -> NodeId {
        let ty_node = node.child_by_field_name("type");
        let ty = ty_node.and_then(|ty| self.lower(ty));
        let elements = match node.child_by_field_name("body") {
            Some(body) => self.literal_elements(body, ty_node),
            None => Vec::new(),
        };
        self.tree
            .push(NodeKind::CompositeLit { ty, elements }, span_of(node))
    }

    /// Elided literal (`{...}` inside another literal) whose type is implied.
    fn literal_value(&mut self, node: Node, implied_type: Option<Node>) -> NodeId {
        let elements = self.literal_elements(node, implied_type);
        self.tree.push(
            NodeKind::CompositeLit { ty: None, elements },
            span_of(node),
        )
    }

    fn literal_elements(&mut self, body: Node, literal_type: Option<Node>) -> Vec<NodeId> {
        let keys_are_exprs = keys_are_expressions(literal_type);
        let elem_type = element_type(literal_type);
        let key_type = literal_type
            .map(unwrap_type)
            .filter(|ty| ty.kind() == "map_type")
            .and_then(|ty| ty.child_by_field_name("key"));

        let mut elements = Vec::new();
        for child in named_children(body) {
            match child.kind() {
                "keyed_element" => {
                    let parts = named_children(child);
                    let (Some(key_node), Some(value_node)) =
                        (parts.first().copied(), parts.get(1).copied())
                    else {
                        continue;
                    };
                    let key_node = unwrap_literal_element(key_node);
                    let value_node = unwrap_literal_element(value_node);

                    let key = if !keys_are_exprs
                        && matches!(key_node.kind(), "identifier" | "field_identifier")
                    {
                        let key = self.text(key_node).to_string();
                        self.facts.field_keys.push(key);
                        self.ident(key_node, IdentRole::CompositeKey)
                    } else {
                        self.element(key_node, key_type)
                    };
                    let value = self.element(value_node, elem_type);
                    elements.push(
                        self.tree
                            .push(NodeKind::KeyedElement { key, value }, span_of(child)),
                    );
                }
                _ => {
                    let inner = unwrap_literal_element(child);
                    elements.push(self.element(inner, elem_type));
                }
            }
        }
        elements
    }

    fn element(&mut self, node: Node, implied_type: Option<Node>) -> NodeId {
        if node.kind() == "literal_value" {
            self.literal_value(node, implied_type)
        } else {
            self.lower_or_empty(node)
        }
    }

    fn field_declaration(&mut self, node: Node) -> NodeId {
        let names: Vec<NodeId> = field_children(node, "name")
            .into_iter()
            .map(|name| self.ident(name, IdentRole::FieldName))
            .collect();
        let ty = node
            .child_by_field_name("type")
            .and_then(|ty| self.lower(ty));

        if names.is_empty() {
            if let Some(type_name) = ty.and_then(|ty| self.embedded_type_name(ty)) {
                self.facts.embedded.insert(type_name);
            }
        }

        self.tree
            .push(NodeKind::Field { names, ty }, span_of(node))
    }

    /// Identifier naming the type of an embedded field (`T`, `pkg.T`, `T[X]`).
    fn embedded_type_name(&self, ty: NodeId) -> Option<NodeId> {
        match self.tree.kind(ty)? {
            NodeKind::Ident(_) => Some(ty),
            NodeKind::Selector { member, .. } => Some(*member),
            NodeKind::Generic { base, .. } => self.embedded_type_name(*base),
            NodeKind::TypeCtor {
                kind: TypeCtorKind::Pointer,
                operands,
            } => operands.first().and_then(|inner| self.embedded_type_name(*inner)),
            _ => None,
        }
    }

    fn generic_type(&mut self, node: Node) -> Option<NodeId> {
        let base_node = node.child_by_field_name("type")?;
        let base = self.lower_or_empty(base_node);
        let args = match node.child_by_field_name("type_arguments") {
            Some(arguments) => self.lower_all(named_children(arguments)),
            None => Vec::new(),
        };
        Some(
            self.tree
                .push(NodeKind::Generic { base, args }, span_of(node)),
        )
    }

    fn index_expression(&mut self, node: Node) -> Option<NodeId> {
        let base_node = node.child_by_field_name("operand")?;
        let base = self.lower_or_empty(base_node);
        let args = self.lower_all(field_children(node, "index"));
        Some(
            self.tree
                .push(NodeKind::Generic { base, args }, span_of(node)),
        )
    }

    fn type_ctor(&mut self, node: Node, kind: TypeCtorKind) -> NodeId {
        let operands = self.lower_all(named_children(node));
        self.tree
            .push(NodeKind::TypeCtor { kind, operands }, span_of(node))
    }

    fn function_type(&mut self, node: Node) -> NodeId {
        let operands = self.scoped(|this| {
            let mut operands = this.parameters(node.child_by_field_name("parameters"));
            operands.extend(this.results(node.child_by_field_name("result")));
            operands
        });
        self.tree.push(
            NodeKind::TypeCtor {
                kind: TypeCtorKind::Func,
                operands,
            },
            span_of(node),
        )
    }

    fn parameters(&mut self, list: Option<Node>) -> Vec<NodeId> {
        let Some(list) = list else {
            return Vec::new();
        };
        self.lower_all(named_children(list))
    }

    fn results(&mut self, result: Option<Node>) -> Vec<NodeId> {
        match result {
            Some(list) if list.kind() == "parameter_list" => self.parameters(Some(list)),
            Some(ty) => self.lower(ty).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Parameter types are resolved before the names come into scope.
    fn parameter(&mut self, node: Node) -> NodeId {
        let ty = node
            .child_by_field_name("type")
            .and_then(|ty| self.lower(ty));
        let names: Vec<NodeId> = field_children(node, "name")
            .into_iter()
            .map(|name| self.declare_local(name))
            .collect();
        self.tree
            .push(NodeKind::Field { names, ty }, span_of(node))
    }

    /// All type parameter names are bound before any constraint is lowered.
    fn type_parameters(&mut self, list: Option<Node>) -> Vec<NodeId> {
        let Some(list) = list else {
            return Vec::new();
        };
        let decls: Vec<Node> = named_children(list)
            .into_iter()
            .filter(|decl| decl.kind() == "type_parameter_declaration")
            .collect();

        let names: Vec<Vec<NodeId>> = decls
            .iter()
            .map(|decl| {
                field_children(*decl, "name")
                    .into_iter()
                    .map(|name| self.declare_local(name))
                    .collect()
            })
            .collect();

        decls
            .into_iter()
            .zip(names)
            .map(|(decl, names)| {
                let ty = decl
                    .child_by_field_name("type")
                    .and_then(|ty| self.lower(ty));
                self.tree
                    .push(NodeKind::Field { names, ty }, span_of(decl))
            })
            .collect()
    }

    /// `func (b *Box[T]) M()` binds `T` for the whole method.
    fn bind_receiver_type_params(&mut self, receiver: Node) {
        let mut stack = vec![receiver];
        while let Some(node) = stack.pop() {
            if node.kind() == "type_arguments" {
                let mut names = Vec::new();
                collect_identifiers(node, &mut names);
                for name in names {
                    let text = self.text(name);
                    self.bind_local(text);
                }
                continue;
            }
            stack.extend(named_children(node));
        }
    }

    fn function_declaration(&mut self, node: Node) -> Option<NodeId> {
        let is_method = node.kind() == "method_declaration";
        let name_node = node.child_by_field_name("name")?;
        let name = if is_method {
            if let Some(owner) = node
                .child_by_field_name("receiver")
                .and_then(|receiver| self.receiver_type_name(receiver))
            {
                self.member(name_node, owner, MemberKind::Method);
            }
            self.ident(name_node, IdentRole::FieldName)
        } else {
            self.declare_top(name_node, DeclKind::Func)
        };

        let kind = self.scoped(|this| {
            let type_params = this.type_parameters(node.child_by_field_name("type_parameters"));
            let receiver = node.child_by_field_name("receiver").map(|receiver| {
                this.bind_receiver_type_params(receiver);
                let fields = this.parameters(Some(receiver));
                this.group(receiver, fields)
            });
            let params = this.parameters(node.child_by_field_name("parameters"));
            let results = this.results(node.child_by_field_name("result"));
            let body = node
                .child_by_field_name("body")
                .and_then(|body| this.lower(body));
            NodeKind::FuncDecl {
                receiver,
                name,
                type_params,
                params,
                results,
                body,
            }
        });

        Some(self.tree.push(kind, span_of(node)))
    }

    fn func_literal(&mut self, node: Node) -> NodeId {
        let kind = self.scoped(|this| {
            let params = this.parameters(node.child_by_field_name("parameters"));
            let results = this.results(node.child_by_field_name("result"));
            let body = match node.child_by_field_name("body") {
                Some(body) => this.lower_or_empty(body),
                None => this.group(node, Vec::new()),
            };
            NodeKind::FuncLit {
                params,
                results,
                body,
            }
        });
        self.tree.push(kind, span_of(node))
    }

    fn method_elem(&mut self, node: Node) -> NodeId {
        let mut children = Vec::new();
        if let Some(name) = node.child_by_field_name("name") {
            children.push(self.ident(name, IdentRole::FieldName));
        }
        let signature = self.scoped(|this| {
            let mut operands = this.parameters(node.child_by_field_name("parameters"));
            operands.extend(this.results(node.child_by_field_name("result")));
            operands
        });
        children.extend(signature);
        self.group(node, children)
    }

    fn type_spec(&mut self, node: Node) -> Option<NodeId> {
        let name_node = node.child_by_field_name("name")?;
        if self.at_top_level() {
            if let Some(ty) = node.child_by_field_name("type") {
                self.struct_fields(self.text(name_node), ty);
            }
        }
        let name = self.declare(name_node, DeclKind::Type);
        let alias = node.kind() == "type_alias";

        let (type_params, ty) = self.scoped(|this| {
            let type_params = this.type_parameters(node.child_by_field_name("type_parameters"));
            let ty = match node.child_by_field_name("type") {
                Some(ty) => this.lower_or_empty(ty),
                None => this.group(node, Vec::new()),
            };
            (type_params, ty)
        });

        Some(self.tree.push(
            NodeKind::TypeSpec {
                name,
                type_params,
                ty,
                alias,
            },
            span_of(node),
        ))
    }

    fn member(&mut self, name: Node, owner: &str, kind: MemberKind) {
        let member = MemberDecl {
            name: self.text(name).to_string(),
            owner: owner.to_string(),
            kind,
            span: span_of(name),
        };
        self.facts.members.push(member);
    }

    /// Named fields of `type Owner struct { ... }`; embedded fields are
    /// named after their type and left out.
    fn struct_fields(&mut self, owner: &str, ty: Node) {
        if ty.kind() != "struct_type" {
            return;
        }
        for list in named_children(ty) {
            if list.kind() != "field_declaration_list" {
                continue;
            }
            for field in named_children(list) {
                if field.kind() != "field_declaration" {
                    continue;
                }
                for name in field_children(field, "name") {
                    self.member(name, owner, MemberKind::Field);
                }
            }
        }
    }

    /// Base type name of a method receiver: `T` for `(t *T)` or `(t T[K])`.
    fn receiver_type_name(&self, receiver: Node) -> Option<&'s str> {
        let param = named_children(receiver)
            .into_iter()
            .find(|child| child.kind() == "parameter_declaration")?;
        let mut ty = unwrap_type(param.child_by_field_name("type")?);
        if ty.kind() == "generic_type" {
            ty = ty.child_by_field_name("type")?;
        }
        (ty.kind() == "type_identifier").then(|| self.text(ty))
    }

    /// Initializers are lowered before the names come into scope.
    fn value_spec(&mut self, node: Node, kind: DeclKind) -> NodeId {
        let ty = node
            .child_by_field_name("type")
            .and_then(|ty| self.lower(ty));
        let mut values = Vec::new();
        for list in field_children(node, "value") {
            if list.kind() == "expression_list" {
                values.extend(self.lower_all(named_children(list)));
            } else {
                values.extend(self.lower(list));
            }
        }
        let names = field_children(node, "name")
            .into_iter()
            .map(|name| self.declare(name, kind))
            .collect();

        self.tree
            .push(NodeKind::ValueSpec { names, ty, values }, span_of(node))
    }

    fn short_var_declaration(&mut self, node: Node) -> NodeId {
        let values = self.expressions(node.child_by_field_name("right"));
        let names = self.declared_names(node.child_by_field_name("left"));
        self.tree.push(
            NodeKind::ValueSpec {
                names,
                ty: None,
                values,
            },
            span_of(node),
        )
    }

    /// `range` clauses and channel receives declare only when written with `:=`.
    fn maybe_declaring_assignment(&mut self, node: Node) -> NodeId {
        if !has_token(node, ":=") {
            let children = self.lower_all(named_children(node));
            return self.group(node, children);
        }
        let values = self.expressions(node.child_by_field_name("right"));
        let names = self.declared_names(node.child_by_field_name("left"));
        self.tree.push(
            NodeKind::ValueSpec {
                names,
                ty: None,
                values,
            },
            span_of(node),
        )
    }

    fn expressions(&mut self, list: Option<Node>) -> Vec<NodeId> {
        match list {
            Some(list) if list.kind() == "expression_list" => {
                self.lower_all(named_children(list))
            }
            Some(expr) => self.lower(expr).into_iter().collect(),
            None => Vec::new(),
        }
    }

    fn declared_names(&mut self, list: Option<Node>) -> Vec<NodeId> {
        let Some(list) = list else {
            return Vec::new();
        };
        let targets = if list.kind() == "expression_list" {
            named_children(list)
        } else {
            vec![list]
        };
        targets
            .into_iter()
            .filter_map(|target| match target.kind() {
                "identifier" => Some(self.declare_local(target)),
                _ => self.lower(target),
            })
            .collect()
    }

    fn type_switch(&mut self, node: Node) -> NodeId {
        let kind = self.scoped(|this| {
            let mut leading = Vec::new();
            if let Some(init) = node.child_by_field_name("initializer") {
                leading.extend(this.lower(init));
            }
            let subject = match node.child_by_field_name("value") {
                Some(value) => this.lower_or_empty(value),
                None => this.group(node, Vec::new()),
            };
            let alias = node
                .child_by_field_name("alias")
                .and_then(|alias| this.declared_names(Some(alias)).into_iter().next());

            let clauses = named_children(node)
                .into_iter()
                .filter(|child| matches!(child.kind(), "type_case" | "default_case"))
                .map(|clause| this.type_case(clause))
                .collect();

            let switch = NodeKind::TypeSwitch {
                alias,
                subject,
                clauses,
            };
            (leading, switch)
        });

        let (leading, switch) = kind;
        let switch_id = self.tree.push(switch, span_of(node));
        if leading.is_empty() {
            switch_id
        } else {
            let mut children = leading;
            children.push(switch_id);
            self.group(node, children)
        }
    }

    fn type_case(&mut self, clause: Node) -> NodeId {
        self.case_clause(clause, "type")
    }

    /// Case clauses get their own scope; `exprs_field` names the field holding
    /// the case expressions (empty for `default`).
    fn case_clause(&mut self, clause: Node, exprs_field: &str) -> NodeId {
        let kind = self.scoped(|this| {
            let expr_nodes = if exprs_field.is_empty() {
                Vec::new()
            } else {
                field_children(clause, exprs_field)
            };
            let expr_ids: HashSet<usize> = expr_nodes.iter().map(|n| n.id()).collect();

            let mut exprs = Vec::new();
            for expr in expr_nodes {
                if expr.kind() == "expression_list" {
                    exprs.extend(this.lower_all(named_children(expr)));
                } else {
                    exprs.extend(this.lower(expr));
                }
            }

            let statements: Vec<Node> = named_children(clause)
                .into_iter()
                .filter(|child| !expr_ids.contains(&child.id()))
                .collect();
            let body = this.lower_all(statements);
            NodeKind::CaseClause { exprs, body }
        });
        self.tree.push(kind, span_of(clause))
    }
}

fn unwrap_literal_element(node: Node) -> Node {
    if node.kind() == "literal_element" {
        named_children(node).into_iter().next().unwrap_or(node)
    } else {
        node
    }
}

fn collect_identifiers<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    if matches!(node.kind(), "identifier" | "type_identifier") {
        out.push(node);
        return;
    }
    for child in named_children(node) {
        collect_identifiers(child, out);
    }
}

#[cfg(test)]
#[path = "go_tests.rs"]
mod tests;
