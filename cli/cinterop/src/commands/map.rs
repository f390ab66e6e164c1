//! `cinterop map`: bundle to binding model.

use std::path::Path;

use anyhow::{Context, Result};
use cinterop_bindgen::BindgenConfig;
use cinterop_map::{map, save_model, MapOptions};
use cinterop_unify::load_bundle;

use super::summarize;

/// Map `input` with the `[map]` section of `config`, or the builtin
/// defaults when there is no configuration.
pub fn run(config: Option<&BindgenConfig>, input: &Path, output: &Path) -> Result<()> {
    let options = match config {
        Some(config) => config.map_options().context("reading [map] configuration")?,
        None => MapOptions::default(),
    };
    let bundle = load_bundle(input).with_context(|| format!("loading {}", input.display()))?;

    let mapping = map(&bundle, &options);
    save_model(output, &mapping.model).with_context(|| format!("writing {}", output.display()))?;

    println!(
        "{}: {} agnostic, {} platform-specific binding(s)",
        output.display(),
        mapping.model.agnostic.len(),
        mapping.model.specific_count()
    );
    println!("{}", summarize("map", &mapping.diagnostics));
    Ok(())
}
