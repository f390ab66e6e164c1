//! Source locations.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Where a declaration or type came from.
///
/// Locations are totally ordered: the synthetic sentinels sort before every
/// real position, and real positions order by file, then line, then column.
/// Output order everywhere in the pipeline is derived from this ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CLocation {
    /// A builtin primitive; has no position.
    #[default]
    BuiltIn,
    /// A declaration from a system header that is not tracked.
    System,
    /// A position in a user header.
    Source { file: String, line: u32, column: u32 },
}

impl CLocation {
    pub fn source(file: impl Into<String>, line: u32, column: u32) -> Self {
        CLocation::Source {
            file: file.into(),
            line,
            column,
        }
    }

    /// Whether this is one of the sentinel locations.
    pub fn is_synthetic(&self) -> bool {
        !matches!(self, CLocation::Source { .. })
    }

    /// Path of the file, if the location is real.
    pub fn file(&self) -> Option<&str> {
        match self {
            CLocation::Source { file, .. } => Some(file),
            _ => None,
        }
    }

    /// Last path component of the file.
    pub fn file_name(&self) -> Option<&str> {
        self.file()
            .map(|f| Path::new(f).file_name().and_then(|n| n.to_str()).unwrap_or(f))
    }

    pub fn line(&self) -> Option<u32> {
        match self {
            CLocation::Source { line, .. } => Some(*line),
            _ => None,
        }
    }
}

impl fmt::Display for CLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CLocation::BuiltIn => f.write_str("<built-in>"),
            CLocation::System => f.write_str("<system>"),
            CLocation::Source { file, line, column } => write!(f, "{file}:{line}:{column}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_path_then_line_then_column() {
        let mut locs = vec![
            CLocation::source("b.h", 1, 1),
            CLocation::source("a.h", 10, 2),
            CLocation::source("a.h", 10, 1),
            CLocation::source("a.h", 2, 40),
            CLocation::BuiltIn,
        ];
        locs.sort();
        assert_eq!(locs[0], CLocation::BuiltIn);
        assert_eq!(locs[1], CLocation::source("a.h", 2, 40));
        assert_eq!(locs[2], CLocation::source("a.h", 10, 1));
        assert_eq!(locs[3], CLocation::source("a.h", 10, 2));
        assert_eq!(locs[4], CLocation::source("b.h", 1, 1));
    }

    #[test]
    fn sentinels_are_synthetic() {
        assert!(CLocation::BuiltIn.is_synthetic());
        assert!(CLocation::System.is_synthetic());
        assert!(!CLocation::source("x.h", 1, 1).is_synthetic());
    }

    #[test]
    fn display_and_file_name() {
        let loc = CLocation::source("include/lib/api.h", 12, 5);
        assert_eq!(loc.to_string(), "include/lib/api.h:12:5");
        assert_eq!(loc.file_name(), Some("api.h"));
        assert_eq!(CLocation::BuiltIn.to_string(), "<built-in>");
    }
}
