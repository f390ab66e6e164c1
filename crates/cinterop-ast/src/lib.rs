//! Canonical C declaration model shared by every cinterop stage.
//!
//! - [`CLocation`]: totally ordered source positions with synthetic sentinels
//! - [`CType`]: a resolved type reference, wrapping pointers and arrays
//! - [`CNode`]: the sum type over every declaration category
//! - [`NodeSet`] / [`CAbstractSyntaxTree`]: name-keyed maps per category
//! - [`Diagnostics`]: the append-only sink every stage reports into
//! - [`persist`]: JSON documents with a SHA-256 payload digest

pub mod diagnostics;
pub mod error;
pub mod location;
pub mod node;
pub mod persist;
pub mod tree;
pub mod types;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::PersistError;
pub use location::CLocation;
pub use node::{
    CEnum, CEnumValue, CFunction, CFunctionPointer, CMacroObject, CNode, COpaqueType, CParameter, CRecord,
    CRecordField, CTypedef, CVariable,
};
pub use tree::{CAbstractSyntaxTree, NodeSet};
pub use types::{CKind, CType, CallingConvention};
