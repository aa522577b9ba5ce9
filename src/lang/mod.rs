//! Go parsing, lowering and build constraints.

pub mod build_constraints;
pub mod go;
pub mod registry;

pub use build_constraints::BuildContext;
pub use go::{GoAdapter, LoweredFile};
pub use registry::{create_parser_for_language, get_tree_sitter_language, language_key_for_path};
