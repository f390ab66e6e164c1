//! Error types for persisted documents.

/// Errors from reading or writing persisted AST documents.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected document format '{actual}', expected '{expected}'")]
    WrongFormat { expected: String, actual: String },

    #[error("unsupported document version {version}")]
    UnsupportedVersion { version: u32 },

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistError>;
