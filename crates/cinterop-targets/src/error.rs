//! Error types for target platform operations.

/// Errors that can occur while resolving a target platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    /// The triple could not be interpreted.
    #[error("invalid target triple '{triple}': {detail}")]
    InvalidTriple {
        /// The triple as given.
        triple: String,
        /// What was wrong with it.
        detail: String,
    },

    /// A platform name was not found among the built-in platforms.
    #[error("unknown target platform '{name}'")]
    UnknownPlatform {
        /// The name that was looked up.
        name: String,
    },

    /// A bitness value other than 32 or 64.
    #[error("unsupported bitness {bits} (expected 32 or 64)")]
    InvalidBitness {
        /// The offending value.
        bits: u32,
    },
}

/// Result type for target operations.
pub type Result<T> = std::result::Result<T, TargetError>;
