//! `cinterop.toml` parsing and project configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use cinterop_explore::ExploreOptions;
use cinterop_map::{MapOptions, SystemTypeAliases};
use cinterop_reader::ReadOptions;
use cinterop_targets::TargetPlatform;
use serde::{Deserialize, Serialize};

use crate::error::{BindgenError, Result};

/// File name searched for by [`BindgenConfig::find_and_load`].
pub const CONFIG_FILE: &str = "cinterop.toml";

/// The top-level configuration of a bindgen project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BindgenConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub targets: TargetsConfig,
    #[serde(default)]
    pub explore: ExploreOptions,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// The header to read and how to preprocess it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InputConfig {
    /// Path of the header, relative to the configuration file.
    pub header: PathBuf,
    #[serde(default)]
    pub include_directories: Vec<PathBuf>,
    /// Extra `#define`s applied on every platform.
    #[serde(default)]
    pub defines: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetsConfig {
    /// Target triples to explore.
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            platforms: default_platforms(),
        }
    }
}

fn default_platforms() -> Vec<String> {
    [
        TargetPlatform::windows_x64(),
        TargetPlatform::linux_x64(),
        TargetPlatform::macos_arm64(),
    ]
    .iter()
    .map(|p| p.triple().to_string())
    .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MapConfig {
    /// C name to binding name.
    pub renames: BTreeMap<String, String>,
    pub ignored_names: BTreeSet<String>,
    /// Alias overrides keyed by `<os>` or `<os>-<32|64>`, then by type name.
    pub system_aliases: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Artifact directory, relative to the configuration file.
    pub directory: PathBuf,
    /// Treat warnings as build failures.
    pub fail_on_warnings: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("bindgen"),
            fail_on_warnings: false,
        }
    }
}

impl BindgenConfig {
    /// A configuration for `header` with every other section defaulted.
    pub fn for_header(header: impl Into<PathBuf>) -> Self {
        Self {
            input: InputConfig {
                header: header.into(),
                include_directories: Vec::new(),
                defines: BTreeMap::new(),
            },
            targets: TargetsConfig::default(),
            explore: ExploreOptions::default(),
            map: MapConfig::default(),
            output: OutputConfig::default(),
        }
    }

    pub fn from_toml_str(s: &str, path: &Path) -> Result<Self> {
        toml::from_str(s).map_err(|source| BindgenError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BindgenError::io(path, e))?;
        Self::from_toml_str(&content, path)
    }

    /// Search upward from `start_dir` for a `cinterop.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                log::debug!("using {}", candidate.display());
                return Ok(Some((Self::load(&candidate)?, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// The template written by `cinterop init`.
    pub fn template(header: &str) -> String {
        format!(
            r#"[input]
header = "{header}"
include-directories = []

[input.defines]

[targets]
platforms = ["x86_64-pc-windows-msvc", "x86_64-unknown-linux-gnu", "aarch64-apple-darwin"]

[explore]
entry-points = "exported-functions"
blocked-headers = []
opaque-types = []

[map]
ignored-names = []

[map.renames]

[output]
directory = "bindgen"
fail-on-warnings = false
"#
        )
    }

    /// The configured platforms, parsed and deduplicated in order.
    pub fn platforms(&self) -> Result<Vec<TargetPlatform>> {
        let mut platforms: Vec<TargetPlatform> = Vec::new();
        for triple in &self.targets.platforms {
            let platform = TargetPlatform::parse(triple)?;
            if !platforms.contains(&platform) {
                platforms.push(platform);
            }
        }
        if platforms.is_empty() {
            return Err(BindgenError::InvalidConfig("[targets] platforms is empty".into()));
        }
        Ok(platforms)
    }

    pub fn header_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.input.header)
    }

    pub fn output_directory(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.output.directory)
    }

    pub fn read_options(&self, platform: &TargetPlatform, base_dir: &Path) -> ReadOptions {
        let mut options = ReadOptions::new(platform.clone());
        for directory in &self.input.include_directories {
            options = options.with_include_directory(base_dir.join(directory));
        }
        for (name, value) in &self.input.defines {
            options = options.with_define(name, value);
        }
        options
    }

    /// Mapper options with the builtin alias tables plus the overrides.
    pub fn map_options(&self) -> Result<MapOptions> {
        let mut system_aliases = SystemTypeAliases::builtin();
        system_aliases.apply_overrides(&self.map.system_aliases)?;
        Ok(MapOptions {
            renames: self.map.renames.clone(),
            ignored_names: self.map.ignored_names.clone(),
            system_aliases,
        })
    }
}

#[cfg(test)]
mod tests {
    use cinterop_explore::EntryPoints;
    use cinterop_map::BindingType;

    use super::*;

    fn parse(s: &str) -> Result<BindgenConfig> {
        BindgenConfig::from_toml_str(s, Path::new(CONFIG_FILE))
    }

    #[test]
    fn parse_full_config() {
        let config = parse(
            r#"
[input]
header = "include/api.h"
include-directories = ["include", "third_party"]

[input.defines]
API_STATIC = "1"

[targets]
platforms = ["x86_64-unknown-linux-gnu", "i686-pc-windows-msvc"]

[explore]
entry-points = { whitelist = ["open_device", "close_device"] }
blocked-headers = ["internal.h"]
opaque-types = ["Device"]
macros = false

[map]
ignored-names = ["Legacy"]

[map.renames]
device_t = "Device"

[map.system-aliases.windows-32]
HANDLE = "u32"

[output]
directory = "out"
fail-on-warnings = true
"#,
        )
        .unwrap();
        assert_eq!(config.input.header, PathBuf::from("include/api.h"));
        assert_eq!(config.input.include_directories.len(), 2);
        assert_eq!(config.input.defines["API_STATIC"], "1");
        assert_eq!(
            config.platforms().unwrap(),
            vec![TargetPlatform::linux_x64(), TargetPlatform::windows_x86()]
        );
        assert_eq!(config.explore.entry_points.required_names().len(), 2);
        assert!(config.explore.is_opaque("Device"));
        assert!(!config.explore.macros);
        assert!(config.explore.variables);
        assert!(config.output.fail_on_warnings);

        let map = config.map_options().unwrap();
        assert_eq!(map.renames["device_t"], "Device");
        assert!(map.ignored_names.contains("Legacy"));
        let table = map.system_aliases.table_for(&TargetPlatform::windows_x86());
        assert_eq!(table["HANDLE"], Some(BindingType::int(32, false)));
    }

    #[test]
    fn parse_minimal_config() {
        let config = parse("[input]\nheader = \"api.h\"\n").unwrap();
        assert_eq!(config, BindgenConfig::for_header("api.h"));
        assert_eq!(config.platforms().unwrap().len(), 3);
        assert_eq!(config.explore.entry_points, EntryPoints::ExportedFunctions);
        assert_eq!(config.output.directory, PathBuf::from("bindgen"));
    }

    #[test]
    fn reject_bad_configs() {
        assert!(matches!(parse("this is not valid toml [[["), Err(BindgenError::Config { .. })));
        assert!(parse("[targets]\nplatforms = []\n").is_err());

        let mut config = BindgenConfig::for_header("api.h");
        config.targets.platforms = vec!["sparc-sun-solaris".into()];
        assert!(matches!(config.platforms(), Err(BindgenError::Target(_))));
        config.targets.platforms.clear();
        assert!(matches!(config.platforms(), Err(BindgenError::InvalidConfig(_))));

        let mut config = BindgenConfig::for_header("api.h");
        config
            .map
            .system_aliases
            .insert("plan9".into(), BTreeMap::from([("x".to_string(), "u8".to_string())]));
        assert!(matches!(config.map_options(), Err(BindgenError::Map(_))));
    }

    #[test]
    fn duplicate_platforms_collapse() {
        let mut config = BindgenConfig::for_header("api.h");
        config.targets.platforms = vec!["x86_64-unknown-linux-gnu".into(), "x86_64-unknown-linux-gnu".into()];
        assert_eq!(config.platforms().unwrap(), vec![TargetPlatform::linux_x64()]);
    }

    #[test]
    fn template_is_valid_toml() {
        let config = parse(&BindgenConfig::template("include/api.h")).unwrap();
        assert_eq!(config.input.header, PathBuf::from("include/api.h"));
        assert_eq!(config.platforms().unwrap().len(), 3);
        assert!(!config.output.fail_on_warnings);
    }

    #[test]
    fn read_options_resolve_against_base_dir() {
        let mut config = BindgenConfig::for_header("api.h");
        config.input.include_directories.push("include".into());
        config.input.defines.insert("API_STATIC".into(), "1".into());
        let options = config.read_options(&TargetPlatform::linux_x64(), Path::new("/project"));
        assert_eq!(options.include_directories, vec![PathBuf::from("/project/include")]);
        assert_eq!(options.defines, vec![("API_STATIC".to_string(), "1".to_string())]);
        assert_eq!(config.header_path(Path::new("/project")), PathBuf::from("/project/api.h"));
    }

    #[test]
    fn find_and_load_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[input]\nheader = \"api.h\"\n").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let (config, found_dir) = BindgenConfig::find_and_load(&nested).unwrap().unwrap();
        assert_eq!(config.input.header, PathBuf::from("api.h"));
        assert_eq!(found_dir, dir.path());
    }
}
