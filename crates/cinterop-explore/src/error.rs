//! Error types for exploration.

use cinterop_targets::TargetPlatform;

/// Fatal exploration failures. Per-declaration problems are diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum ExploreError {
    #[error("{platform}: translation unit {file} has {} fatal parse error(s): {}", errors.len(), errors.join("; "))]
    FatalParse {
        platform: TargetPlatform,
        file: String,
        errors: Vec<String>,
    },

    #[error("{platform}: {source}")]
    Read {
        platform: TargetPlatform,
        #[source]
        source: cinterop_reader::ReadError,
    },
}

/// Result type for exploration.
pub type Result<T> = std::result::Result<T, ExploreError>;
