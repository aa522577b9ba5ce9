//! Configuration management commands.

use owo_colors::OwoColorize;

use crate::cli::args::ValidateConfigArgs;
use pkgshift::core::config::PkgshiftConfig;

/// Print default configuration in YAML format
pub fn print_default_config() -> anyhow::Result<()> {
    println!("{}", "# Default pkgshift configuration".dimmed());
    println!("{}", "# Save this as .pkgshift.yml or pass it with --config".dimmed());
    println!();

    let config = PkgshiftConfig::default();
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

/// Validate a configuration file and summarize it
pub fn validate_config(args: ValidateConfigArgs) -> anyhow::Result<()> {
    let config = match PkgshiftConfig::from_file(&args.config).and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Configuration validation failed:".red(), e);
            eprintln!(
                "{}",
                "Tip: use 'pkgshift print-default-config' to see the valid format".dimmed()
            );
            return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
        }
    };

    println!(
        "{} {}",
        "Configuration file is valid:".bright_green().bold(),
        args.config.display()
    );
    let formatter = config
        .output
        .formatter
        .as_ref()
        .map_or_else(|| "none".to_string(), |cmd| cmd.join(" "));
    row("build tags", join_or_none(&config.project.build_tags));
    row("include tests", config.project.include_tests);
    row("exclude patterns", join_or_none(&config.project.exclude_patterns));
    row("add prefix", or_none(&config.rename.add_prefix));
    row("delete prefix", or_none(&config.rename.delete_prefix));
    row("qualifier deletion", format!("{:?}", config.output.qualifier_deletion));
    row("formatter", formatter);
    row("workers", config.performance.worker_count());
    Ok(())
}

fn row(setting: &str, value: impl std::fmt::Display) {
    let label = format!("{:<20}", format!("{setting}:"));
    println!("  {} {}", label.dimmed(), value);
}

fn join_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "none".to_string()
    } else {
        values.join(", ")
    }
}

fn or_none(value: &str) -> &str {
    if value.is_empty() {
        "none"
    } else {
        value
    }
}
