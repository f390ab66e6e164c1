//! `cinterop init`: configuration scaffolding.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use cinterop_bindgen::{BindgenConfig, CONFIG_FILE};

/// Write a `cinterop.toml` template into `dir`, creating it if needed.
pub fn run(dir: &Path, header: &str) -> Result<()> {
    let config_path = dir.join(CONFIG_FILE);
    if config_path.exists() {
        bail!("{} already exists", config_path.display());
    }
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    fs::write(&config_path, BindgenConfig::template(header))
        .with_context(|| format!("writing {}", config_path.display()))?;

    println!("Created {}", config_path.display());
    if !dir.join(header).is_file() {
        println!("  header '{header}' does not exist yet");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_a_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("bindings");
        run(&project, "api.h").unwrap();

        let config = BindgenConfig::load(&project.join(CONFIG_FILE)).unwrap();
        assert_eq!(config.input.header, Path::new("api.h"));
    }

    #[test]
    fn init_refuses_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), "api.h").unwrap();
        let result = run(dir.path(), "api.h");
        assert!(result.unwrap_err().to_string().contains("already exists"));
    }
}
