//! CLI Command Implementations
//!
//! - migrate: the `move` command
//! - expose: the expose planner
//! - config: configuration management commands

pub mod config;
pub mod expose;
pub mod migrate;

pub use config::{print_default_config, validate_config};
pub use expose::expose_command;
pub use migrate::move_command;
