//! Type graph exploration for cinterop.
//!
//! Starting from a header's entry points, the explorer follows every type
//! reference transitively and produces one [`CAbstractSyntaxTree`] per
//! platform: each reachable declaration exactly once, anonymous types named,
//! function pointers promoted to named nodes and padding made explicit.

pub mod error;
pub mod explorer;
pub mod macros;
pub mod naming;
pub mod options;

use std::path::Path;

use cinterop_ast::CAbstractSyntaxTree;
use cinterop_reader::{read_header, ReadOptions, TranslationUnit};
use cinterop_targets::TargetPlatform;
use rayon::prelude::*;

pub use error::{ExploreError, Result};
pub use explorer::{explore, Exploration};
pub use options::{EntryPoints, ExploreOptions};

/// Read a header for one platform and explore it.
pub fn explore_header(path: &Path, read_options: &ReadOptions, options: &ExploreOptions) -> Result<Exploration> {
    let unit = read_header(path, read_options).map_err(|source| ExploreError::Read {
        platform: read_options.platform.clone(),
        source,
    })?;
    explore(&unit, options)
}

/// Explore several units in parallel. Results keep the order of `units`.
pub fn explore_platforms<U>(units: &[U], options: &ExploreOptions) -> Vec<(TargetPlatform, Result<Exploration>)>
where
    U: TranslationUnit + Sync,
{
    units
        .par_iter()
        .map(|unit| (unit.platform().clone(), explore(unit, options)))
        .collect()
}

/// Just the trees of the explorations that succeeded.
pub fn successful_trees(results: &[(TargetPlatform, Result<Exploration>)]) -> Vec<CAbstractSyntaxTree> {
    results
        .iter()
        .filter_map(|(_, result)| result.as_ref().ok())
        .map(|exploration| exploration.tree.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use cinterop_reader::read_source;

    use super::*;

    const HEADER: &str = "#ifdef _WIN32\ntypedef unsigned long flags_t;\n#else\ntypedef unsigned int flags_t;\n#endif\n\
                          struct Request { flags_t flags; void* payload; };\n\
                          int submit(struct Request* request);\n";

    #[test]
    fn platforms_are_explored_in_parallel_and_in_order() {
        let platforms = [TargetPlatform::linux_x64(), TargetPlatform::windows_x64(), TargetPlatform::linux_x86()];
        let units: Vec<_> = platforms
            .iter()
            .map(|p| read_source(HEADER, "request.h", &ReadOptions::new(p.clone())).unwrap())
            .collect();
        let results = explore_platforms(&units, &ExploreOptions::default());
        let order: Vec<&TargetPlatform> = results.iter().map(|(p, _)| p).collect();
        assert_eq!(order, platforms.iter().collect::<Vec<_>>());

        let trees = successful_trees(&results);
        assert_eq!(trees.len(), 3);
        let sizes: Vec<u64> = trees.iter().map(|t| t.nodes.records["Request"].size_of).collect();
        assert_eq!(sizes, vec![16, 16, 8]);
        assert_eq!(trees[1].nodes.typedefs["flags_t"].underlying.name, "unsigned long");
    }

    #[test]
    fn missing_header_is_a_read_error() {
        let read_options = ReadOptions::new(TargetPlatform::linux_x64());
        let err = explore_header(Path::new("/nonexistent/api.h"), &read_options, &ExploreOptions::default()).unwrap_err();
        assert!(matches!(err, ExploreError::Read { .. }));
    }
}
