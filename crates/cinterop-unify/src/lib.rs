//! Cross-platform unification for cinterop.
//!
//! The explorer produces one tree per platform. [`unify`] diffs them and
//! builds a [`CrossPlatformBundle`]: declarations that are structurally
//! identical everywhere are stored once, everything else is stored per
//! platform and reported.

pub mod bundle;
pub mod unify;

pub use bundle::{load_bundle, save_bundle, CrossPlatformBundle, BUNDLE_FORMAT};
pub use unify::{unify, Unification};
