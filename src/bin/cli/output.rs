//! Terminal display of migration reports.

use std::path::Path;

use owo_colors::OwoColorize;

use pkgshift::MigrationReport;

/// Print one report in human-readable form. Paths are shown relative to
/// `work_dir` where possible.
pub fn display_report(report: &MigrationReport, work_dir: &Path) {
    println!(
        "{} {} {} {}",
        "Moved".bright_green().bold(),
        relative(&report.target, work_dir).cyan(),
        "->".dimmed(),
        relative(&report.output, work_dir).cyan()
    );
    println!(
        "  {} {} -> {}",
        "package:".dimmed(),
        report.origin_namespace.name,
        report.destination_namespace.name.bold()
    );
    println!(
        "  {} {} moved, {} retained",
        "symbols:".dimmed(),
        report.moved_symbols.len(),
        report.retained_symbols.len()
    );
    println!(
        "  {} {} rewritten, {} skipped, {} references changed",
        "files:".dimmed(),
        report.files_rewritten.len(),
        report.files_skipped.len(),
        report.decisions.changes()
    );

    for file in &report.files_rewritten {
        println!("    {} {}", "~".yellow(), relative(file, work_dir));
    }
    for file in &report.files_skipped {
        println!("    {} {} (unparseable)", "!".red(), relative(file, work_dir));
    }

    if !report.warnings.is_empty() {
        println!("  {} {}", "warnings:".yellow().bold(), report.warnings.len());
        for warning in &report.warnings {
            let location = match (warning.line, warning.column) {
                (Some(line), Some(column)) => format!("{}:{line}:{column}", relative(&warning.file, work_dir)),
                _ => relative(&warning.file, work_dir),
            };
            println!("    {} {}", location.dimmed(), warning.message);
        }
    }
    println!();
}

fn relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}
