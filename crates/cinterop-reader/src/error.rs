//! Error types for header reading.
//!
//! Every variant is fatal for the platform being read. Problems with single
//! declarations are the explorer's business and never surface here.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}:{line}:{column}: syntax error: {detail}")]
    Syntax {
        file: String,
        line: u32,
        column: u32,
        detail: String,
    },

    #[error("{file}:{line}: include not found: \"{include}\"")]
    IncludeNotFound { file: String, line: u32, include: String },

    #[error("{file}:{line}: #error {message}")]
    ErrorDirective { file: String, line: u32, message: String },

    #[error("{file}:{line}: preprocessor error: {detail}")]
    Preprocessor { file: String, line: u32, detail: String },

    #[error("parser setup failed: {0}")]
    Language(String),
}

/// Result type for reader operations.
pub type Result<T> = std::result::Result<T, ReadError>;
