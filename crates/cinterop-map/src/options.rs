//! Mapper configuration.

use std::collections::{BTreeMap, BTreeSet};

use crate::aliases::SystemTypeAliases;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapOptions {
    /// C name to binding name.
    pub renames: BTreeMap<String, String>,
    /// Declarations left out of the model. Matched before and after renaming.
    pub ignored_names: BTreeSet<String>,
    pub system_aliases: SystemTypeAliases,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            renames: BTreeMap::new(),
            ignored_names: BTreeSet::new(),
            system_aliases: SystemTypeAliases::builtin(),
        }
    }
}

impl MapOptions {
    pub fn with_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.insert(from.into(), to.into());
        self
    }

    pub fn with_ignored(mut self, name: impl Into<String>) -> Self {
        self.ignored_names.insert(name.into());
        self
    }
}
