//! Type mapping for cinterop.
//!
//! The mapper rewrites every declaration of a [`CrossPlatformBundle`] in
//! binding terms: system typedefs become sized integers or pointers through
//! per-platform alias tables, user renames and ignores are applied, and
//! enums get a backing integer. The result is a [`BindingModel`] with the
//! same agnostic/specific split as the bundle.
//!
//! [`CrossPlatformBundle`]: cinterop_unify::CrossPlatformBundle

pub mod aliases;
pub mod binding;
pub mod error;
pub mod mapper;
pub mod model;
pub mod options;

pub use aliases::{AliasTable, SystemTypeAliases};
pub use binding::BindingType;
pub use error::{MapError, Result};
pub use mapper::{map, Mapping};
pub use model::{load_model, save_model, BindingModel, BindingNodes, MODEL_FORMAT};
pub use options::MapOptions;
