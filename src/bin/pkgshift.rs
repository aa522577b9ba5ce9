//! pkgshift CLI: move Go files between packages.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands, LogFormat};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let result = match cli.command {
        Commands::Move(args) => cli::move_command(*args),
        Commands::Expose(args) => cli::expose_command(args),
        Commands::PrintDefaultConfig => cli::print_default_config(),
        Commands::ValidateConfig(args) => cli::validate_config(args),
    };

    if let Err(err) = result {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `--verbose` selects debug, the default is info.
fn init_tracing(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
