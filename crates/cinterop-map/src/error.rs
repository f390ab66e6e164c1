//! Error types for type mapping.

/// Errors from mapping configuration and model persistence. Mapping
/// conflicts themselves are diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("invalid binding type '{spelling}': {detail}")]
    InvalidBindingType { spelling: String, detail: String },

    #[error("invalid system alias scope '{scope}': expected <os> or <os>-<32|64>")]
    InvalidAliasScope { scope: String },

    #[error("persisted model: {0}")]
    Persist(#[from] cinterop_ast::PersistError),
}

/// Result type for mapping operations.
pub type Result<T> = std::result::Result<T, MapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = MapError::InvalidBindingType {
            spelling: "i7".into(),
            detail: "unknown type".into(),
        };
        assert_eq!(err.to_string(), "invalid binding type 'i7': unknown type");
        let err = MapError::InvalidAliasScope { scope: "beos".into() };
        assert!(err.to_string().contains("beos"));
    }
}
