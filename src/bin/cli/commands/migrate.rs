//! The `move` command.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

use crate::cli::args::MoveArgs;
use crate::cli::config_layer::build_move_config;
use crate::cli::output::display_report;
use pkgshift::MigrationEngine;

/// Move every requested file into the destination package.
pub fn move_command(args: MoveArgs) -> anyhow::Result<()> {
    let config = build_move_config(&args)?;
    let targets = collect_targets(&args.files, io::stdin().lock())?;
    if targets.is_empty() {
        anyhow::bail!("no files to move");
    }

    let engine = MigrationEngine::new(config, &args.project.workdir)?;
    info!(
        files = targets.len(),
        destination = %args.new_package,
        "Starting migration"
    );

    let reports = engine.migrate_all(&targets, &args.new_package, args.output.as_deref())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            display_report(report, engine.work_dir());
        }
    }
    Ok(())
}

/// Expand `-` into the paths listed on `stdin`, one per line.
pub fn collect_targets(files: &[PathBuf], stdin: impl BufRead) -> anyhow::Result<Vec<PathBuf>> {
    let reads_stdin = files.iter().any(|file| file == Path::new("-"));
    let mut targets: Vec<PathBuf> = files
        .iter()
        .filter(|file| *file != Path::new("-"))
        .cloned()
        .collect();

    if reads_stdin {
        for line in stdin.lines() {
            let line = line.context("Failed to read file list from stdin")?;
            let line = line.trim();
            if !line.is_empty() {
                targets.push(PathBuf::from(line));
            }
        }
    }
    Ok(targets)
}
