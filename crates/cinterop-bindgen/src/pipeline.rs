//! The end-to-end pipeline: read, explore per platform, unify, map.

use std::fs;
use std::path::{Path, PathBuf};

use cinterop_ast::persist::save_tree;
use cinterop_ast::{CAbstractSyntaxTree, CLocation, Diagnostic, DiagnosticKind, Diagnostics, Severity};
use cinterop_explore::explore_header;
use cinterop_map::{map, save_model, BindingModel};
use cinterop_targets::TargetPlatform;
use cinterop_unify::{save_bundle, unify, CrossPlatformBundle};
use rayon::prelude::*;

use crate::config::BindgenConfig;
use crate::error::{BindgenError, Result};

/// Trees of the platforms that could be explored.
#[derive(Debug, Clone)]
pub struct ExploreOutput {
    pub trees: Vec<CAbstractSyntaxTree>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub trees: Vec<CAbstractSyntaxTree>,
    pub bundle: CrossPlatformBundle,
    pub model: BindingModel,
    pub diagnostics: Diagnostics,
}

impl PipelineOutput {
    /// Whether the diagnostics fail the build.
    pub fn should_fail(&self, fail_on_warnings: bool) -> bool {
        fails_build(&self.diagnostics, fail_on_warnings)
    }
}

/// Any error fails a build; warnings only when asked to.
pub fn fails_build(diagnostics: &Diagnostics, fail_on_warnings: bool) -> bool {
    match diagnostics.max_severity() {
        Some(Severity::Error) => true,
        Some(Severity::Warning) => fail_on_warnings,
        _ => false,
    }
}

/// Read and explore the configured header on every platform in parallel.
///
/// A platform that cannot be read or explored is reported as an error
/// diagnostic and left out. It is only fatal when no platform succeeds.
pub fn explore_stage(config: &BindgenConfig, base_dir: &Path) -> Result<ExploreOutput> {
    let platforms = config.platforms()?;
    let header = config.header_path(base_dir);
    log::info!("exploring {} on {} platform(s)", header.display(), platforms.len());

    let results: Vec<_> = platforms
        .par_iter()
        .map(|platform| {
            let read_options = config.read_options(platform, base_dir);
            (platform, explore_header(&header, &read_options, &config.explore))
        })
        .collect();

    let mut trees = Vec::new();
    let mut diagnostics = Diagnostics::new();
    let mut failures = Vec::new();
    for (platform, result) in results {
        match result {
            Ok(exploration) => {
                diagnostics.extend(exploration.diagnostics);
                trees.push(exploration.tree);
            }
            Err(err) => {
                failures.push(err.to_string());
                diagnostics.push(
                    Diagnostic::new(Severity::Error, DiagnosticKind::ParseFailure, err.to_string())
                        .at(CLocation::BuiltIn)
                        .on(platform),
                );
            }
        }
    }
    if trees.is_empty() {
        return Err(BindgenError::NoPlatformSucceeded { header, failures });
    }
    Ok(ExploreOutput { trees, diagnostics })
}

/// Run every stage. Diagnostics of all stages are collected in order.
pub fn run_pipeline(config: &BindgenConfig, base_dir: &Path) -> Result<PipelineOutput> {
    let map_options = config.map_options()?;
    let ExploreOutput { trees, mut diagnostics } = explore_stage(config, base_dir)?;

    let unification = unify(&trees, &config.explore.entry_points.required_names());
    diagnostics.extend(unification.diagnostics);

    let mapping = map(&unification.bundle, &map_options);
    diagnostics.extend(mapping.diagnostics);

    log::info!(
        "pipeline finished with {} error(s) and {} warning(s)",
        diagnostics.count(Severity::Error),
        diagnostics.count(Severity::Warning)
    );
    Ok(PipelineOutput {
        trees,
        bundle: unification.bundle,
        model: mapping.model,
        diagnostics,
    })
}

/// Path of the persisted tree of `platform` under `directory`.
pub fn tree_path(directory: &Path, platform: &TargetPlatform) -> PathBuf {
    directory.join("ast").join(format!("{}.json", platform.triple()))
}

/// Write every tree under `directory/ast/`.
pub fn write_trees(trees: &[CAbstractSyntaxTree], directory: &Path) -> Result<Vec<PathBuf>> {
    let ast_dir = directory.join("ast");
    fs::create_dir_all(&ast_dir).map_err(|e| BindgenError::io(&ast_dir, e))?;
    trees
        .iter()
        .map(|tree| {
            let path = tree_path(directory, &tree.platform);
            save_tree(&path, tree)?;
            Ok(path)
        })
        .collect()
}

/// Write `ast/<triple>.json`, `bundle.json` and `model.json` under
/// `directory`. Returns the written paths.
pub fn write_artifacts(output: &PipelineOutput, directory: &Path) -> Result<Vec<PathBuf>> {
    let mut written = write_trees(&output.trees, directory)?;

    let bundle_path = directory.join("bundle.json");
    save_bundle(&bundle_path, &output.bundle)?;
    written.push(bundle_path);

    let model_path = directory.join("model.json");
    save_model(&model_path, &output.model)?;
    written.push(model_path);

    log::info!("wrote {} artifact(s) to {}", written.len(), directory.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostics_with(severity: Severity) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::new(severity, DiagnosticKind::PlatformMismatch, "x"));
        diagnostics
    }

    #[test]
    fn errors_always_fail_and_warnings_only_on_request() {
        assert!(!fails_build(&Diagnostics::new(), true));
        assert!(fails_build(&diagnostics_with(Severity::Error), false));
        assert!(!fails_build(&diagnostics_with(Severity::Warning), false));
        assert!(fails_build(&diagnostics_with(Severity::Warning), true));
        assert!(!fails_build(&diagnostics_with(Severity::Info), true));
    }

    #[test]
    fn trees_land_under_ast_by_triple() {
        let path = tree_path(Path::new("out"), &TargetPlatform::linux_x64());
        assert_eq!(path, PathBuf::from("out/ast/x86_64-unknown-linux-gnu.json"));
    }
}
