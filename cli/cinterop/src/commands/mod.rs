//! CLI command implementations.

pub mod bindgen;
pub mod explore;
pub mod init;
pub mod map;
pub mod targets;
pub mod unify;

use cinterop_ast::{Diagnostics, Severity};

/// One-line summary of a diagnostics sink. The diagnostics themselves have
/// already been logged as they were pushed.
pub(crate) fn summarize(stage: &str, diagnostics: &Diagnostics) -> String {
    format!(
        "{stage}: {} error(s), {} warning(s)",
        diagnostics.count(Severity::Error),
        diagnostics.count(Severity::Warning)
    )
}
