//! C header reader for cinterop.
//!
//! The explorer never talks to a parser directly. It walks a
//! [`TranslationUnit`]: a read-only graph of cursors (declarations) and types
//! addressed by copyable integer handles. [`UnitGraph`] is the owned arena
//! implementation; [`read_header`] fills one from a header on disk by
//! preprocessing it for a target platform and lowering the tree-sitter parse.

pub mod error;
pub mod eval;
pub mod graph;
pub mod layout;
pub mod lower;
pub mod preprocess;
pub mod reader;
pub mod unit;

pub use error::ReadError;
pub use graph::{UnitGraph, UnitGraphBuilder};
pub use reader::{read_header, read_source, ReadOptions};
pub use unit::{Cursor, CursorKind, Linkage, TranslationUnit, TypeHandle, TypeKind};
