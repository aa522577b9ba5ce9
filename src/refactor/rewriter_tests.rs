use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;

use super::*;
use crate::core::config::RenameRule;
use crate::core::file_utils::ModuleInfo;
use crate::io::source::Project;
use crate::io::writer::render_tree;
use crate::refactor::SymbolSet;

const WIDGET: &str = "package alpha

type Widget struct {
\tGadget *Gadget
}

func NewWidget() *Widget {
\treturn &Widget{Gadget: MakeGadget()}
}
";

const GADGET: &str = "package alpha

type Gadget struct{}

func MakeGadget() *Gadget { return &Gadget{} }
";

const USER: &str = "package alpha

func Build() *Widget { return NewWidget() }
";

const GAMMA: &str = "package gamma

import (
\t\"fmt\"

\t\"example.com/shop/alpha\"
)

func main() {
\tfmt.Println(alpha.NewWidget(), alpha.MakeGadget())
}
";

fn project(extra: &[(&str, &str)]) -> Project {
    let root = PathBuf::from("/shop");
    let mut sources = vec![
        (root.join("alpha/widget.go"), WIDGET.to_string()),
        (root.join("alpha/gadget.go"), GADGET.to_string()),
        (root.join("alpha/user.go"), USER.to_string()),
        (root.join("gamma/main.go"), GAMMA.to_string()),
    ];
    sources.extend(extra.iter().map(|(path, source)| (root.join(path), source.to_string())));
    Project::from_sources(
        ModuleInfo {
            root,
            module_path: "example.com/shop".to_string(),
        },
        sources,
    )
    .unwrap()
}

fn project_of(files: &[(&str, &str)]) -> Project {
    let root = PathBuf::from("/shop");
    Project::from_sources(
        ModuleInfo {
            root: root.clone(),
            module_path: "example.com/shop".to_string(),
        },
        files
            .iter()
            .map(|(path, source)| (root.join(path), source.to_string()))
            .collect(),
    )
    .unwrap()
}

fn context(
    project: &Project,
    destination: NamespaceId,
    output: &str,
    rename: RenameRule,
    deletion: QualifierDeletion,
) -> MigrationContext {
    let target = Path::new("/shop/alpha/widget.go");
    let index = project.index();
    let id = project.find(target).unwrap();
    let origin = index.namespace_of(id).unwrap();
    let destination_decls = index
        .namespace_at(&destination.import_path)
        .map(|ns| index.declarations(ns))
        .unwrap_or_default();
    let symbols = SymbolSet::classify(&index.declarations(&origin), target).with_collisions(
        &destination_decls,
        &rename,
        target,
    );
    MigrationContext::new(
        origin,
        target.to_path_buf(),
        id,
        destination,
        PathBuf::from(output),
        rename,
        deletion,
        symbols,
    )
}

fn beta() -> NamespaceId {
    NamespaceId::new("beta", "example.com/shop/beta")
}

fn to_beta(project: &Project) -> MigrationContext {
    context(
        project,
        beta(),
        "/shop/beta/widget.go",
        RenameRule::default(),
        QualifierDeletion::Textual,
    )
}

fn rewrite(project: &Project, ctx: &MigrationContext, path: &str, mode: RewriteMode) -> (FileRewrite, String) {
    let id = project.find(Path::new(path)).unwrap();
    let tree = project.file(id).unwrap().tree.clone().unwrap();
    let rewrite = rewrite_file(ctx, project.index(), id, tree, mode).unwrap();
    let text = render_tree(&rewrite.tree, &rewrite.imports, ctx.qualifier_deletion);
    (rewrite, text)
}

#[test]
fn moved_file_qualifies_retained_names() {
    let project = project(&[]);
    let ctx = to_beta(&project);
    let (rewrite, text) = rewrite(&project, &ctx, "/shop/alpha/widget.go", RewriteMode::MovedFile);

    assert!(rewrite.modified);
    assert_eq!(
        text,
        "package beta

import \"example.com/shop/alpha\"

type Widget struct {
\tGadget *alpha.Gadget
}

func NewWidget() *Widget {
\treturn &Widget{Gadget: alpha.MakeGadget()}
}
"
    );
    assert_eq!(rewrite.decisions.add_qualifier, 2);
}

#[test]
fn sibling_file_qualifies_moved_names() {
    let project = project(&[]);
    let ctx = to_beta(&project);
    let (rewrite, text) = rewrite(&project, &ctx, "/shop/alpha/user.go", RewriteMode::OtherFile);

    assert!(rewrite.modified);
    assert_eq!(
        text,
        "package alpha

import \"example.com/shop/beta\"

func Build() *beta.Widget { return beta.NewWidget() }
"
    );
}

#[test]
fn unrelated_sibling_is_untouched() {
    let project = project(&[]);
    let ctx = to_beta(&project);
    let (rewrite, text) = rewrite(&project, &ctx, "/shop/alpha/gadget.go", RewriteMode::OtherFile);

    assert!(!rewrite.modified);
    assert!(rewrite.imports.is_empty());
    assert_eq!(text, GADGET);
}

#[test]
fn importer_swaps_qualifier_and_keeps_used_import() {
    let project = project(&[]);
    let ctx = to_beta(&project);
    let (rewrite, text) = rewrite(&project, &ctx, "/shop/gamma/main.go", RewriteMode::OtherFile);

    assert!(rewrite.modified);
    assert!(rewrite.imports.remove.is_empty());
    assert_eq!(
        text,
        "package gamma

import (
\t\"fmt\"

\t\"example.com/shop/alpha\"
\t\"example.com/shop/beta\"
)

func main() {
\tfmt.Println(beta.NewWidget(), alpha.MakeGadget())
}
"
    );
}

#[test]
fn importer_drops_origin_import_when_unused() {
    let project = project(&[(
        "gamma/only.go",
        "package gamma\n\nimport \"example.com/shop/alpha\"\n\nvar w = alpha.NewWidget()\n",
    )]);
    let ctx = to_beta(&project);
    let (_, text) = rewrite(&project, &ctx, "/shop/gamma/only.go", RewriteMode::OtherFile);

    assert_eq!(
        text,
        "package gamma\n\nimport \"example.com/shop/beta\"\n\nvar w = beta.NewWidget()\n"
    );
}

#[test]
fn destination_file_loses_redundant_qualifier() {
    let source = "package beta\n\nimport \"example.com/shop/alpha\"\n\nvar w = alpha.Widget{}\n";
    let expected = "package beta\n\n\nvar w = Widget{}\n";

    for deletion in [QualifierDeletion::Textual, QualifierDeletion::Structural] {
        let project = project(&[("beta/existing.go", source)]);
        let ctx = context(&project, beta(), "/shop/beta/widget.go", RenameRule::default(), deletion);
        let (rewrite, text) = rewrite(&project, &ctx, "/shop/beta/existing.go", RewriteMode::OtherFile);

        assert_eq!(text, expected, "{deletion:?}");
        assert!(rewrite.imports.remove.contains("example.com/shop/alpha"));
        assert!(rewrite.imports.add.is_empty());
    }
}

#[test]
fn moved_file_drops_destination_qualifier() {
    let project = project_of(&[
        (
            "alpha/widget.go",
            "package alpha\n\nimport \"example.com/shop/beta\"\n\ntype Widget struct{}\n\nfunc (Widget) Name() string { return beta.Label() }\n",
        ),
        ("beta/helpers.go", "package beta\n\nfunc Label() string { return \"w\" }\n"),
    ]);
    let ctx = to_beta(&project);
    let (rewrite, text) = rewrite(&project, &ctx, "/shop/alpha/widget.go", RewriteMode::MovedFile);

    assert_eq!(
        text,
        "package beta\n\n\ntype Widget struct{}\n\nfunc (Widget) Name() string { return Label() }\n"
    );
    assert_eq!(rewrite.decisions.mark_for_textual_deletion, 1);
    assert!(rewrite.imports.remove.contains("example.com/shop/beta"));
}

#[test]
fn delete_prefix_renames_everywhere() {
    let project = project(&[]);
    let ctx = context(
        &project,
        beta(),
        "/shop/beta/widget.go",
        RenameRule::new("", "W"),
        QualifierDeletion::Textual,
    );

    let (_, moved) = rewrite(&project, &ctx, "/shop/alpha/widget.go", RewriteMode::MovedFile);
    assert!(moved.contains("type idget struct"));
    assert!(moved.contains("func NewWidget() *idget"));
    assert!(moved.contains("&idget{Gadget: alpha.MakeGadget()}"));

    let (_, user) = rewrite(&project, &ctx, "/shop/alpha/user.go", RewriteMode::OtherFile);
    assert!(user.contains("func Build() *beta.idget { return beta.NewWidget() }"));
}

#[test]
fn shadowed_package_name_is_not_rewritten() {
    let source = "package gamma

import \"example.com/shop/alpha\"

func run(alpha struct{ Widget int }) int {
\treturn alpha.Widget
}

var made = alpha.NewWidget()
";
    let project = project(&[("gamma/shadow.go", source)]);
    let ctx = to_beta(&project);
    let (_, text) = rewrite(&project, &ctx, "/shop/gamma/shadow.go", RewriteMode::OtherFile);

    assert!(text.contains("func run(alpha struct{ Widget int }) int {\n\treturn alpha.Widget\n}"));
    assert!(text.contains("var made = beta.NewWidget()"));
    assert!(text.contains("import \"example.com/shop/beta\""));
    assert!(!text.contains("\"example.com/shop/alpha\""));
}

#[test]
fn field_names_and_keys_survive_renames() {
    let source = "package gamma

import \"example.com/shop/alpha\"

type Holder struct {
\tWidget *alpha.Widget
}

var h = Holder{Widget: alpha.NewWidget()}
var n = h.Widget
";
    let project = project(&[("gamma/holder.go", source)]);
    let ctx = context(
        &project,
        beta(),
        "/shop/beta/widget.go",
        RenameRule::new("X", ""),
        QualifierDeletion::Textual,
    );
    let (_, text) = rewrite(&project, &ctx, "/shop/gamma/holder.go", RewriteMode::OtherFile);

    assert!(text.contains("\tWidget *beta.XWidget\n"));
    assert!(text.contains("Holder{Widget: beta.XNewWidget()}"));
    assert!(text.contains("var n = h.Widget"));
}

#[test]
fn embedded_rename_warns() {
    let source = "package gamma

import \"example.com/shop/alpha\"

type Box struct {
\talpha.Widget
}
";
    let project = project(&[("gamma/box.go", source)]);
    let ctx = context(
        &project,
        beta(),
        "/shop/beta/widget.go",
        RenameRule::new("X", ""),
        QualifierDeletion::Textual,
    );
    let (_, text) = rewrite(&project, &ctx, "/shop/gamma/box.go", RewriteMode::OtherFile);

    assert!(text.contains("\tbeta.XWidget\n"));
    let warnings = ctx.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::EmbeddedRename);
    assert_eq!(warnings[0].symbol.as_deref(), Some("Widget"));
}

#[test]
fn ambiguous_names_are_left_alone_with_one_warning() {
    let project = project(&[("beta/existing.go", "package beta\n\ntype Widget int\n")]);
    let ctx = to_beta(&project);
    assert!(ctx.symbols.is_ambiguous("Widget"));

    let (_, text) = rewrite(&project, &ctx, "/shop/alpha/widget.go", RewriteMode::MovedFile);
    assert!(text.contains("type Widget struct"));
    assert!(text.contains("&Widget{"));

    let ambiguous: Vec<_> = ctx
        .warnings()
        .into_iter()
        .filter(|w| w.kind == WarningKind::AmbiguousBinding)
        .collect();
    assert_eq!(ambiguous.len(), 1);
}

#[test]
fn unexported_reference_from_moved_file_warns() {
    let project = project_of(&[
        ("alpha/widget.go", "package alpha\n\nvar Answer = secret()\n"),
        ("alpha/secret.go", "package alpha\n\nfunc secret() int { return 1 }\n"),
    ]);
    let ctx = to_beta(&project);
    let (_, text) = rewrite(&project, &ctx, "/shop/alpha/widget.go", RewriteMode::MovedFile);

    assert!(text.contains("var Answer = secret()"));
    let warnings = ctx.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::UnexportedReference);
    assert_eq!(warnings[0].symbol.as_deref(), Some("secret"));
    assert_eq!(warnings[0].line, Some(3));
}

#[test]
fn rerun_into_same_namespace_changes_nothing() {
    let project = project(&[]);
    let ctx = context(
        &project,
        NamespaceId::new("alpha", "example.com/shop/alpha"),
        "/shop/alpha/widget.go",
        RenameRule::default(),
        QualifierDeletion::Textual,
    );

    let (moved, text) = rewrite(&project, &ctx, "/shop/alpha/widget.go", RewriteMode::MovedFile);
    assert!(!moved.modified);
    assert_eq!(text, WIDGET);

    for path in ["/shop/alpha/user.go", "/shop/gamma/main.go"] {
        let (other, _) = rewrite(&project, &ctx, path, RewriteMode::OtherFile);
        assert!(!other.modified, "{path}");
        assert!(other.imports.is_empty(), "{path}");
    }
}

#[test]
fn nodes_are_decided_once() {
    let project = project(&[]);
    let ctx = to_beta(&project);
    let (first, _) = rewrite(&project, &ctx, "/shop/alpha/user.go", RewriteMode::OtherFile);
    assert!(first.modified);

    let (second, _) = rewrite(&project, &ctx, "/shop/alpha/user.go", RewriteMode::OtherFile);
    assert!(!second.modified);
    assert_eq!(second.decisions, DecisionCounts::default());
}

#[test]
fn destination_qualifier_avoids_other_import_names() {
    let source = "package gamma

import (
\t\"example.com/shop/alpha\"
\t\"example.com/vendor/beta\"
)

var w = alpha.NewWidget()
var t = beta.Thing()
";
    let project = project(&[("gamma/vendor.go", source)]);
    let ctx = to_beta(&project);
    let (rewrite, text) = rewrite(&project, &ctx, "/shop/gamma/vendor.go", RewriteMode::OtherFile);

    assert_eq!(
        rewrite.imports.add.get("example.com/shop/beta"),
        Some(&Some("beta2".to_string()))
    );
    assert_eq!(
        text,
        "package gamma

import (
\t\"example.com/vendor/beta\"
\tbeta2 \"example.com/shop/beta\"
)

var w = beta2.NewWidget()
var t = beta.Thing()
"
    );
}

#[test]
fn destination_qualifier_avoids_local_names() {
    let source = "package gamma

import \"example.com/shop/alpha\"

func Make() any {
\tbeta := alpha.NewWidget()
\treturn beta
}
";
    let project = project(&[("gamma/local.go", source)]);
    let ctx = to_beta(&project);
    let (_, text) = rewrite(&project, &ctx, "/shop/gamma/local.go", RewriteMode::OtherFile);

    assert_eq!(
        text,
        "package gamma

import beta2 \"example.com/shop/beta\"

func Make() any {
\tbeta := beta2.NewWidget()
\treturn beta
}
"
    );
}

#[test]
fn fresh_names_take_the_first_free_suffix() {
    let taken: BTreeSet<String> = ["beta", "beta2"].iter().map(|s| s.to_string()).collect();
    assert_eq!(fresh_name("beta", &taken), "beta3");
    assert_eq!(fresh_name("alpha", &taken), "alpha");
}

#[test]
fn unused_dot_import_of_origin_is_dropped() {
    let source = "package gamma\n\nimport . \"example.com/shop/alpha\"\n\nvar w = NewWidget()\n";
    let project = project(&[("gamma/dot.go", source)]);
    let ctx = to_beta(&project);
    let (rewrite, text) = rewrite(&project, &ctx, "/shop/gamma/dot.go", RewriteMode::OtherFile);

    assert!(rewrite.imports.remove.contains("example.com/shop/alpha"));
    assert_eq!(
        text,
        "package gamma\n\nimport \"example.com/shop/beta\"\n\nvar w = beta.NewWidget()\n"
    );
}

#[test]
fn destination_file_drops_dot_import_of_moved_names() {
    let source = "package beta\n\nimport . \"example.com/shop/alpha\"\n\nvar w = NewWidget()\n";
    let project = project(&[("beta/dot.go", source)]);
    let ctx = to_beta(&project);
    let (_, text) = rewrite(&project, &ctx, "/shop/beta/dot.go", RewriteMode::OtherFile);

    assert_eq!(text, "package beta\n\n\nvar w = NewWidget()\n");
}

#[test]
fn dot_import_still_in_use_is_kept() {
    let source = "package gamma\n\nimport . \"example.com/shop/alpha\"\n\nvar w = NewWidget()\nvar g = MakeGadget()\n";
    let project = project(&[("gamma/dot.go", source)]);
    let ctx = to_beta(&project);
    let (rewrite, text) = rewrite(&project, &ctx, "/shop/gamma/dot.go", RewriteMode::OtherFile);

    assert!(rewrite.imports.remove.is_empty());
    assert_eq!(
        text,
        "package gamma\n\nimport . \"example.com/shop/alpha\"\nimport \"example.com/shop/beta\"\n\nvar w = beta.NewWidget()\nvar g = MakeGadget()\n"
    );
}

const SHAPES: &str = "package alpha

type Pair[K any, V any] struct {
\tk K
\tv V
}

type W2 = Widget

type Box struct {
\tWidget
\tw Widget
}

var p Pair[Widget, Gadget]

func Apply() {
\tf := func(w *Widget) *Widget { return w }
\t_ = f(NewWidget())
}

func Describe(v any) string {
\tswitch v.(type) {
\tcase Widget, *Gadget:
\t\treturn \"known\"
\t}
\treturn \"\"
}

func Shadow() int {
\tif Widget := 1; Widget > 0 {
\t\treturn Widget
\t}
\treturn 0
}
";

#[test]
fn sibling_edge_shapes_are_requalified() {
    let project = project(&[("alpha/shapes.go", SHAPES)]);
    let ctx = to_beta(&project);
    let (rewrite, text) = rewrite(&project, &ctx, "/shop/alpha/shapes.go", RewriteMode::OtherFile);

    assert_eq!(
        text,
        "package alpha

import \"example.com/shop/beta\"

type Pair[K any, V any] struct {
\tk K
\tv V
}

type W2 = beta.Widget

type Box struct {
\tbeta.Widget
\tw beta.Widget
}

var p Pair[beta.Widget, Gadget]

func Apply() {
\tf := func(w *beta.Widget) *beta.Widget { return w }
\t_ = f(beta.NewWidget())
}

func Describe(v any) string {
\tswitch v.(type) {
\tcase beta.Widget, *Gadget:
\t\treturn \"known\"
\t}
\treturn \"\"
}

func Shadow() int {
\tif Widget := 1; Widget > 0 {
\t\treturn Widget
\t}
\treturn 0
}
"
    );
    assert_eq!(rewrite.decisions.add_qualifier, 8);
    assert!(ctx.warnings().is_empty());
}

#[test]
fn moved_file_edge_shapes() {
    let project = project_of(&[
        (
            "alpha/widget.go",
            "package alpha

type Widget struct{}

const (
\tWA Kind = iota + KindBase
\tWB
)

var Convert = func(k Kind) Widget { return Widget{} }
",
        ),
        ("alpha/kind.go", "package alpha\n\ntype Kind int\n\nconst KindBase Kind = 10\n"),
    ]);
    let ctx = to_beta(&project);
    let (_, text) = rewrite(&project, &ctx, "/shop/alpha/widget.go", RewriteMode::MovedFile);

    assert_eq!(
        text,
        "package beta

import \"example.com/shop/alpha\"

type Widget struct{}

const (
\tWA alpha.Kind = iota + alpha.KindBase
\tWB
)

var Convert = func(k alpha.Kind) Widget { return Widget{} }
"
    );
}
