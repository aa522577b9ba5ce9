//! Output writer for rewritten Go files.
//!
//! Rendering never re-prints the tree. Every changed identifier is spliced
//! into the original source at its span, so formatting and comments stay as
//! they were. Placeholder qualifiers are then removed (textually or by byte
//! range) and imports are normalized.

use std::fs;
use std::path::Path;
use std::process::Command;

use tracing::{debug, info, warn};

use crate::core::ast::{ImportSpec, Span, SyntaxTree, PLACEHOLDER};
use crate::core::config::{OutputConfig, QualifierDeletion};
use crate::core::errors::{PkgshiftError, Result};
use crate::core::pipeline::context::{ImportEdits, ModifiedFile};

/// Persists rewritten files.
pub trait OutputWriter: Send + Sync {
    /// Render and write one registered file to its output path.
    fn write(&self, file: &ModifiedFile) -> Result<()>;
}

/// Writer for Go sources.
#[derive(Debug, Clone, Default)]
pub struct GoSourceWriter {
    config: OutputConfig,
}

impl GoSourceWriter {
    /// Create a writer
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Final text of a registered file
    pub fn render(&self, file: &ModifiedFile) -> String {
        render_tree(&file.tree, &file.imports, self.config.qualifier_deletion)
    }

    fn run_formatter(&self, command: &[String], path: &Path) -> Result<()> {
        let Some((program, args)) = command.split_first() else {
            return Ok(());
        };
        debug!(program, file = %path.display(), "Running formatter");

        let output = Command::new(program)
            .args(args)
            .arg(path)
            .output()
            .map_err(|e| PkgshiftError::write_io(path, format!("failed to run formatter `{program}`"), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PkgshiftError::write(
                path,
                format!("formatter `{program}` failed: {}", stderr.trim()),
            ));
        }
        Ok(())
    }
}

impl OutputWriter for GoSourceWriter {
    fn write(&self, file: &ModifiedFile) -> Result<()> {
        let path = &file.output_path;
        let text = self.render(file);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PkgshiftError::write_io(path, "failed to create output directory", e)
            })?;
        }
        fs::write(path, text).map_err(|e| PkgshiftError::write_io(path, "failed to write file", e))?;

        if let Some(command) = &self.config.formatter {
            self.run_formatter(command, path)?;
        }

        info!(file = %path.display(), "Wrote file");
        Ok(())
    }
}

#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
    /// The text is a deletion placeholder
    placeholder: bool,
}

impl Edit {
    fn replace(span: (usize, usize), text: impl Into<String>) -> Self {
        Self {
            start: span.0,
            end: span.1,
            text: text.into(),
            placeholder: false,
        }
    }

    fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace((at, at), text)
    }
}

/// Render a rewritten tree against its original source.
pub fn render_tree(tree: &SyntaxTree, imports: &ImportEdits, deletion: QualifierDeletion) -> String {
    let source = tree.source();
    let mut edits = Vec::new();

    for (id, ident) in tree.changed_idents() {
        if ident.placeholder && deletion == QualifierDeletion::Structural {
            continue;
        }
        let span = tree.span(id);
        let mut edit = Edit::replace((span.start, span.end), ident.rendered());
        edit.placeholder = ident.placeholder;
        edits.push(edit);
    }

    if deletion == QualifierDeletion::Structural {
        for (operand, member) in tree.placeholder_selectors() {
            edits.push(Edit::replace(
                (tree.span(operand).start, tree.span(member).start),
                "",
            ));
        }
    }

    import_edits(tree, imports, &mut edits);

    let (text, marks) = apply_edits(source, edits);
    match deletion {
        QualifierDeletion::Textual => strip_placeholders(&text, &marks),
        QualifierDeletion::Structural => text,
    }
}

/// Splice `edits` into `source`. Also returns the output offsets at which
/// placeholder edits were written.
fn apply_edits(source: &str, mut edits: Vec<Edit>) -> (String, Vec<usize>) {
    edits.sort_by_key(|edit| (edit.start, edit.end));

    let mut out = String::with_capacity(source.len() + 64);
    let mut marks = Vec::new();
    let mut cursor = 0;
    for edit in edits {
        if edit.start < cursor {
            warn!(start = edit.start, end = edit.end, "Dropping overlapping edit");
            continue;
        }
        out.push_str(source.get(cursor..edit.start).unwrap_or(""));
        if edit.placeholder {
            marks.push(out.len());
        }
        out.push_str(&edit.text);
        cursor = edit.end.max(edit.start);
    }
    out.push_str(source.get(cursor..).unwrap_or(""));
    (out, marks)
}

/// Remove `PLACEHOLDER .` (whitespace around the dot allowed) at each
/// offset in `marks`. Occurrences anywhere else, such as inside string
/// literals or comments, are kept.
pub fn strip_placeholders(text: &str, marks: &[usize]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for &at in marks {
        if at < cursor {
            continue;
        }
        let Some(after) = text.get(at..).and_then(|rest| rest.strip_prefix(PLACEHOLDER)) else {
            continue;
        };
        let Some(member) = after.trim_start().strip_prefix('.') else {
            continue;
        };
        out.push_str(text.get(cursor..at).unwrap_or(""));
        cursor = text.len() - member.trim_start().len();
    }
    out.push_str(text.get(cursor..).unwrap_or(""));
    out
}

fn import_edits(tree: &SyntaxTree, imports: &ImportEdits, edits: &mut Vec<Edit>) {
    let source = tree.source();
    let specs = tree.imports();

    // Group specs by their declaration, keeping declaration order.
    let mut decls: Vec<(Span, bool, Vec<&ImportSpec>)> = Vec::new();
    for spec in &specs {
        match decls.iter_mut().find(|(span, _, _)| *span == spec.decl_span) {
            Some((_, _, members)) => members.push(spec),
            None => decls.push((spec.decl_span, spec.grouped, vec![spec])),
        }
    }

    let mut surviving: Vec<(Span, bool)> = Vec::new();
    let mut first_removed: Option<usize> = None;
    for (decl_span, grouped, members) in &decls {
        let removed: Vec<&&ImportSpec> = members
            .iter()
            .filter(|spec| imports.remove.contains(&spec.path))
            .collect();

        if removed.len() == members.len() {
            debug!(line = decl_span.line, "Removing import declaration");
            let range = line_range(source, *decl_span);
            first_removed.get_or_insert(range.0);
            edits.push(Edit::replace(range, ""));
            continue;
        }
        for spec in removed {
            debug!(path = %spec.path, "Removing import");
            edits.push(Edit::replace(line_range(source, spec.span), ""));
        }
        surviving.push((*decl_span, *grouped));
    }

    if imports.add.is_empty() {
        return;
    }
    let lines: Vec<String> = imports
        .add
        .iter()
        .map(|(path, alias)| match alias {
            Some(alias) => format!("{alias} \"{path}\""),
            None => format!("\"{path}\""),
        })
        .collect();

    if let Some((decl_span, _)) = surviving.iter().find(|(_, grouped)| *grouped) {
        let close = decl_span.end.saturating_sub(1);
        let line_start = line_start(source, close);
        let block: String = lines.iter().map(|line| format!("\t{line}\n")).collect();
        if source.get(line_start..close).is_some_and(|s| s.trim().is_empty()) {
            edits.push(Edit::insert(line_start, block));
        } else {
            edits.push(Edit::insert(close, format!("\n{block}")));
        }
        return;
    }

    let declaration = if lines.len() == 1 {
        format!("import {}", lines[0])
    } else {
        let block: String = lines.iter().map(|line| format!("\t{line}\n")).collect();
        format!("import (\n{block})")
    };

    match (surviving.last(), first_removed) {
        (Some((decl_span, _)), _) => edits.push(Edit::insert(decl_span.end, format!("\n{declaration}"))),
        // Take the place of the declaration that was removed.
        (None, Some(at)) => edits.push(Edit::insert(at, format!("{declaration}\n"))),
        (None, None) => {
            let anchor = tree
                .package_ident()
                .map(|id| line_end(source, tree.span(id).end))
                .unwrap_or(0);
            edits.push(Edit::insert(anchor, format!("\n\n{declaration}")));
        }
    }
}

fn line_start(source: &str, at: usize) -> usize {
    source
        .get(..at)
        .and_then(|head| head.rfind('\n'))
        .map_or(0, |i| i + 1)
}

/// Offset of the newline ending the line that contains `at`
fn line_end(source: &str, at: usize) -> usize {
    source
        .get(at..)
        .and_then(|tail| tail.find('\n'))
        .map_or(source.len(), |i| at + i)
}

/// Whole lines covered by `span`, including the final newline
fn line_range(source: &str, span: Span) -> (usize, usize) {
    let start = line_start(source, span.start);
    let end = line_end(source, span.end);
    (start, (end + 1).min(source.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ast::{IdentRole, NodeId, NodeKind};
    use crate::lang::go::GoAdapter;
    use crate::oracle::{FileId, NamespaceId};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn lower(source: &str) -> SyntaxTree {
        GoAdapter::new()
            .unwrap()
            .lower_file(Path::new("/shop/gamma/main.go"), source.to_string())
            .unwrap()
            .tree
    }

    fn find(tree: &SyntaxTree, name: &str, role: IdentRole) -> Vec<NodeId> {
        let mut found = Vec::new();
        tree.walk(tree.root(), |id, node| {
            if let NodeKind::Ident(ident) = &node.kind {
                if ident.original == name && ident.role == role {
                    found.push((node.span.start, id));
                }
            }
        });
        found.sort();
        found.into_iter().map(|(_, id)| id).collect()
    }

    const GAMMA: &str = "package gamma\n\nimport (\n\t\"fmt\"\n\n\t\"example.com/shop/alpha\"\n)\n\nfunc Run() {\n\tfmt.Println(alpha.NewWidget())\n}\n";

    #[test]
    fn requalified_selector_and_import_swap() {
        let mut tree = lower(GAMMA);
        let operand = find(&tree, "alpha", IdentRole::Reference)[0];
        tree.ident_mut(operand).unwrap().name = "beta".into();

        let mut imports = ImportEdits::default();
        imports.add.insert("example.com/shop/beta".into(), None);
        imports.remove.insert("example.com/shop/alpha".into());

        let text = render_tree(&tree, &imports, QualifierDeletion::Textual);
        assert_eq!(
            text,
            "package gamma\n\nimport (\n\t\"fmt\"\n\n\t\"example.com/shop/beta\"\n)\n\nfunc Run() {\n\tfmt.Println(beta.NewWidget())\n}\n"
        );
    }

    #[test]
    fn textual_and_structural_deletion_agree() {
        let source = "package beta\n\nimport \"example.com/shop/alpha\"\n\nvar w = alpha.Widget{}\n";
        let mut tree = lower(source);
        let operand = find(&tree, "alpha", IdentRole::Reference)[0];
        tree.ident_mut(operand).unwrap().placeholder = true;

        let mut imports = ImportEdits::default();
        imports.remove.insert("example.com/shop/alpha".into());

        let expected = "package beta\n\n\nvar w = Widget{}\n";
        assert_eq!(render_tree(&tree, &imports, QualifierDeletion::Textual), expected);
        assert_eq!(render_tree(&tree, &imports, QualifierDeletion::Structural), expected);
    }

    #[test]
    fn replacement_import_takes_the_removed_line() {
        let source = "package gamma\n\nimport \"example.com/shop/alpha\"\n\nvar w = alpha.NewWidget()\n";
        let mut tree = lower(source);
        let operand = find(&tree, "alpha", IdentRole::Reference)[0];
        tree.ident_mut(operand).unwrap().name = "beta".into();

        let mut imports = ImportEdits::default();
        imports.add.insert("example.com/shop/beta".into(), None);
        imports.remove.insert("example.com/shop/alpha".into());

        assert_eq!(
            render_tree(&tree, &imports, QualifierDeletion::Textual),
            "package gamma\n\nimport \"example.com/shop/beta\"\n\nvar w = beta.NewWidget()\n"
        );
    }

    #[test]
    fn adds_first_import_after_package_clause() {
        let source = "package beta\n\nfunc Use() int { return Helper() }\n";
        let mut tree = lower(source);
        let helper = find(&tree, "Helper", IdentRole::Reference)[0];
        tree.ident_mut(helper).unwrap().qualifier = Some("alpha".into());

        let mut imports = ImportEdits::default();
        imports.add.insert("example.com/shop/alpha".into(), None);

        assert_eq!(
            render_tree(&tree, &imports, QualifierDeletion::Textual),
            "package beta\n\nimport \"example.com/shop/alpha\"\n\nfunc Use() int { return alpha.Helper() }\n"
        );
    }

    #[test]
    fn aliased_import_after_single_declaration() {
        let source = "package gamma\n\nimport \"fmt\"\n\nvar _ = fmt.Sprint()\n";
        let tree = lower(source);
        let mut imports = ImportEdits::default();
        imports.add.insert("gopkg.in/yaml.v3".into(), None);
        imports.add.insert("example.com/shop/v2".into(), Some("shop".into()));

        assert_eq!(
            render_tree(&tree, &imports, QualifierDeletion::Textual),
            "package gamma\n\nimport \"fmt\"\nimport (\n\tshop \"example.com/shop/v2\"\n\t\"gopkg.in/yaml.v3\"\n)\n\nvar _ = fmt.Sprint()\n"
        );
    }

    #[test]
    fn placeholder_without_dot_is_kept() {
        let text = format!("a {PLACEHOLDER} . B and {PLACEHOLDER}");
        let marks = [2, text.rfind(PLACEHOLDER).unwrap()];
        assert_eq!(strip_placeholders(&text, &marks), format!("a B and {PLACEHOLDER}"));
        assert_eq!(strip_placeholders(&text, &[]), text);
    }

    #[test]
    fn textual_deletion_leaves_literals_and_comments_alone() {
        let source = format!(
            "package beta\n\nimport \"example.com/shop/alpha\"\n\nvar w = alpha.Widget{{}}\nvar s = \"{PLACEHOLDER}.x\" // {PLACEHOLDER}.y\n"
        );
        let mut tree = lower(&source);
        let operand = find(&tree, "alpha", IdentRole::Reference)[0];
        tree.ident_mut(operand).unwrap().placeholder = true;

        let mut imports = ImportEdits::default();
        imports.remove.insert("example.com/shop/alpha".into());

        assert_eq!(
            render_tree(&tree, &imports, QualifierDeletion::Textual),
            format!("package beta\n\n\nvar w = Widget{{}}\nvar s = \"{PLACEHOLDER}.x\" // {PLACEHOLDER}.y\n")
        );
    }

    #[test]
    fn write_creates_directories() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("beta/widget.go");
        let file = ModifiedFile {
            source: FileId(0),
            source_path: PathBuf::from("/shop/gamma/main.go"),
            output_path: output.clone(),
            tree: lower(GAMMA),
            modified: false,
            namespace: NamespaceId::new("gamma", "example.com/shop/gamma"),
            imports: ImportEdits::default(),
        };

        GoSourceWriter::default().write(&file).unwrap();
        assert_eq!(fs::read_to_string(output).unwrap(), GAMMA);
    }

    #[cfg(unix)]
    #[test]
    fn failing_formatter_is_write_error() {
        let temp = TempDir::new().unwrap();
        let file = ModifiedFile {
            source: FileId(0),
            source_path: PathBuf::from("/shop/gamma/main.go"),
            output_path: temp.path().join("main.go"),
            tree: lower(GAMMA),
            modified: true,
            namespace: NamespaceId::new("gamma", "example.com/shop/gamma"),
            imports: ImportEdits::default(),
        };
        let writer = GoSourceWriter::new(OutputConfig {
            formatter: Some(vec!["false".to_string()]),
            ..OutputConfig::default()
        });

        let err = writer.write(&file).unwrap_err();
        assert!(matches!(err, PkgshiftError::Write { .. }));
    }
}
