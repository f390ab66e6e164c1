//! Explorer configuration.

use std::collections::BTreeSet;

use cinterop_ast::CLocation;
use serde::{Deserialize, Serialize};

/// Which declarations seed the traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryPoints {
    /// Every function with external linkage in the user's headers.
    #[default]
    ExportedFunctions,
    /// Only the named functions and variables. Names missing from a
    /// platform are reported.
    Whitelist(BTreeSet<String>),
}

impl EntryPoints {
    pub fn whitelist<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EntryPoints::Whitelist(names.into_iter().map(Into::into).collect())
    }

    /// Names every platform must provide.
    pub fn required_names(&self) -> BTreeSet<String> {
        match self {
            EntryPoints::ExportedFunctions => BTreeSet::new(),
            EntryPoints::Whitelist(names) => names.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExploreOptions {
    pub entry_points: EntryPoints,
    /// Header file names or path suffixes whose declarations are reported
    /// when reached.
    pub blocked_headers: Vec<String>,
    /// Names forced to opaque types whatever their definition.
    pub opaque_types: BTreeSet<String>,
    /// Explore external variables.
    pub variables: bool,
    /// Explore object-like macros.
    pub macros: bool,
    /// Explore named enums even when no entry point reaches them.
    pub enums: bool,
    /// Allow functions and variables from system headers as entry points.
    pub system_declarations: bool,
}

impl Default for ExploreOptions {
    fn default() -> Self {
        Self {
            entry_points: EntryPoints::default(),
            blocked_headers: Vec::new(),
            opaque_types: BTreeSet::new(),
            variables: true,
            macros: true,
            enums: true,
            system_declarations: false,
        }
    }
}

impl ExploreOptions {
    pub fn is_blocked(&self, location: &CLocation) -> bool {
        let Some(file) = location.file() else {
            return false;
        };
        let file = file.replace('\\', "/");
        self.blocked_headers.iter().any(|blocked| {
            let blocked = blocked.replace('\\', "/");
            file == blocked || file.ends_with(&format!("/{blocked}"))
        })
    }

    pub fn is_opaque(&self, name: &str) -> bool {
        self.opaque_types.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_headers_match_by_suffix() {
        let options = ExploreOptions {
            blocked_headers: vec!["internal/detail.h".into()],
            ..ExploreOptions::default()
        };
        assert!(options.is_blocked(&CLocation::source("/src/lib/internal/detail.h", 3, 1)));
        assert!(!options.is_blocked(&CLocation::source("/src/lib/notinternal/detail.h", 3, 1)));
        assert!(!options.is_blocked(&CLocation::System));
    }

    #[test]
    fn entry_points_deserialize_from_kebab_case() {
        let exported: EntryPoints = serde_json::from_str("\"exported-functions\"").unwrap();
        assert_eq!(exported, EntryPoints::ExportedFunctions);
        let listed: EntryPoints = serde_json::from_str(r#"{"whitelist": ["open", "close"]}"#).unwrap();
        assert_eq!(listed.required_names().len(), 2);
    }

    #[test]
    fn defaults_enable_variables_and_macros() {
        let options: ExploreOptions = serde_json::from_str("{}").unwrap();
        assert!(options.variables);
        assert!(options.macros);
        assert!(!options.system_declarations);
    }
}
