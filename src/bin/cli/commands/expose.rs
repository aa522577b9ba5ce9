//! The `expose` command.

use owo_colors::OwoColorize;

use crate::cli::args::ExposeArgs;
use crate::cli::config_layer::build_project_config;
use pkgshift::expose::ExposeExecutor;
use pkgshift::MigrationEngine;

/// Print (or run) the renames that export names a move would break.
pub fn expose_command(args: ExposeArgs) -> anyhow::Result<()> {
    let config = build_project_config(&args.project)?;
    let engine = MigrationEngine::new(config, &args.project.workdir)?;
    let suggestions = engine.plan_expose(&args.file)?;

    if suggestions.is_empty() {
        eprintln!("{}", "Nothing to expose.".bright_green());
        return Ok(());
    }

    if !args.execute {
        for suggestion in &suggestions {
            println!("{suggestion}");
        }
        return Ok(());
    }

    let failed = ExposeExecutor::default()
        .in_dir(engine.work_dir())
        .execute(&suggestions);
    eprintln!(
        "{} {} of {} renames applied",
        "Expose:".bright_blue().bold(),
        suggestions.len() - failed.len(),
        suggestions.len()
    );
    for suggestion in &failed {
        eprintln!("  {} {suggestion}", "failed:".red());
    }
    Ok(())
}
