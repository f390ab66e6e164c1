//! `cinterop bindgen`: the whole pipeline.

use std::path::Path;

use anyhow::{bail, Context, Result};
use cinterop_ast::Severity;
use cinterop_bindgen::{run_pipeline, write_artifacts, BindgenConfig};

use super::summarize;

/// Run every stage and write the artifacts. Fails afterwards when the
/// diagnostics call for it.
pub fn run(config: &BindgenConfig, project_dir: &Path, output: Option<&Path>, fail_on_warnings: bool) -> Result<()> {
    let output_dir = output.map_or_else(|| config.output_directory(project_dir), Path::to_path_buf);
    let result = run_pipeline(config, project_dir).context("running pipeline")?;
    write_artifacts(&result, &output_dir).with_context(|| format!("writing artifacts to {}", output_dir.display()))?;

    println!("Wrote artifacts to {}", output_dir.display());
    println!("{}", summarize("bindgen", &result.diagnostics));

    let fail_on_warnings = fail_on_warnings || config.output.fail_on_warnings;
    if result.should_fail(fail_on_warnings) {
        let errors = result.diagnostics.count(Severity::Error);
        let warnings = result.diagnostics.count(Severity::Warning);
        if errors > 0 {
            bail!("bindgen failed with {errors} error(s)");
        }
        bail!("bindgen failed with {warnings} warning(s) (fail-on-warnings is set)");
    }
    Ok(())
}
