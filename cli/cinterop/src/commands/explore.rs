//! `cinterop explore`: one AST document per platform.

use std::path::Path;

use anyhow::{Context, Result};
use cinterop_bindgen::{explore_stage, write_trees, BindgenConfig};

use super::summarize;

pub fn run(config: &BindgenConfig, project_dir: &Path, output: Option<&Path>) -> Result<()> {
    let explored = explore_stage(config, project_dir).context("exploring header")?;
    let directory = output.map_or_else(|| config.output_directory(project_dir), Path::to_path_buf);
    let written = write_trees(&explored.trees, &directory).context("writing AST files")?;

    for path in &written {
        println!("  {}", path.display());
    }
    println!("{}", summarize("explore", &explored.diagnostics));
    Ok(())
}
