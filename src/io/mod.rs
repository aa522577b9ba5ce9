//! Reading the project in and writing rewritten files out.
//!
//! - **source**: loads a Go module into parsed trees plus a binding index
//! - **writer**: renders rewritten trees onto their original text and
//!   persists them

pub mod source;
pub mod writer;

pub use source::{Project, SourceFile};
pub use writer::{render_tree, strip_placeholders, GoSourceWriter, OutputWriter};
