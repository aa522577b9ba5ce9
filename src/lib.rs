//! # pkgshift: move Go files between packages
//!
//! Moving a file from one Go package to another breaks references in both
//! directions: the moved file loses unqualified access to its old siblings,
//! and every other file that used the moved declarations now points at the
//! wrong package. pkgshift rewrites both sides:
//!
//! - names the moved file keeps using from its old package get qualified
//! - references to moved declarations elsewhere get the new qualifier, or
//!   lose their qualifier where they already live in the destination
//! - an optional prefix rule renames every moved declaration
//! - imports are added and removed to match
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   API (MigrationEngine) / CLI                │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Coordinator │  Rewriter   │   Oracle    │      I/O           │
//! │ • priming   │ • symbols   │ • use sites │ • module loading   │
//! │ • fan-out   │ • decisions │ • bindings  │ • splice rendering │
//! │ • flush     │ • imports   │ • packages  │ • formatter hook   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use pkgshift::{MigrationEngine, PkgshiftConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = MigrationEngine::new(PkgshiftConfig::default(), "./shop")?;
//!     let report = engine.migrate(Path::new("alpha/widget.go"), "beta", Some(Path::new("beta")))?;
//!
//!     println!("{} files rewritten", report.files_rewritten.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core data structures and the migration pipeline
pub mod core {
    //! Configuration, errors, the syntax tree and the migration pipeline.

    pub mod ast;
    pub mod config;
    pub mod errors;
    pub mod file_utils;
    pub mod pipeline;
}

// Go parsing and lowering
pub mod lang;

// Name resolution
pub mod oracle;

// Reference rewriting
pub mod refactor;

// Project loading and output
pub mod io;

// Unexported-name planning
pub mod expose;

// Public API and engine interface
pub mod api {
    //! High-level API and engine interface.

    pub mod engine;
}

// Re-export primary types for convenience
pub use api::engine::MigrationEngine;
pub use core::config::PkgshiftConfig;
pub use core::errors::{PkgshiftError, Result, ResultExt};
pub use core::pipeline::{MigrationPhase, MigrationReport, MigrationWarning, WarningKind};
pub use expose::{ExposePlanner, RenameSuggestion};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
