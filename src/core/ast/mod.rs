//! Language-neutral syntax tree used by the rewriter.
//!
//! This module provides:
//! - an arena-backed [`SyntaxTree`] whose nodes are addressed by stable [`NodeId`]s
//! - the closed [`NodeKind`] enum, one variant per construct the rewriter cares about
//! - identifier payloads that remember their original spelling, so the tree
//!   can be re-rendered by splicing only what changed

pub mod tree;


pub use tree::{
    Ident, IdentRole, ImportSpec, Node, NodeId, NodeKind, Span, SyntaxTree, TypeCtorKind,
    PLACEHOLDER,
};
