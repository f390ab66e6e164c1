//! Error types for the bindgen driver.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BindgenError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Target(#[from] cinterop_targets::TargetError),

    #[error(transparent)]
    Map(#[from] cinterop_map::MapError),

    #[error(transparent)]
    Persist(#[from] cinterop_ast::PersistError),

    #[error("{header}: no platform could be explored ({})", failures.join("; "))]
    NoPlatformSucceeded { header: PathBuf, failures: Vec<String> },
}

impl BindgenError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BindgenError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for the driver.
pub type Result<T> = std::result::Result<T, BindgenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_platform_error_lists_failures() {
        let err = BindgenError::NoPlatformSucceeded {
            header: PathBuf::from("api.h"),
            failures: vec!["linux: boom".into(), "windows: bang".into()],
        };
        assert_eq!(err.to_string(), "api.h: no platform could be explored (linux: boom; windows: bang)");
    }
}
