//! Reference rewriting.
//!
//! [`SymbolSet`] partitions the origin namespace into moved and retained
//! names, and [`ReferenceRewriter`] turns one file's tree into its migrated
//! form, one [`RewriteDecision`] per reference.

pub mod decision;
pub mod rewriter;
pub mod symbols;

pub use decision::{DecisionCounts, DecisionKind, RewriteDecision};
pub use rewriter::{rewrite_file, FileRewrite, ReferenceRewriter, RewriteMode};
pub use symbols::SymbolSet;
