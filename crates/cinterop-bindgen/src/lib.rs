//! Driver for cinterop.
//!
//! Loads a `cinterop.toml` configuration and runs the whole pipeline over
//! one C header: read and explore it once per target platform, unify the
//! per-platform trees into a cross-platform bundle, and map the bundle into
//! a binding model. Artifacts of every stage can be written to disk.

pub mod config;
pub mod error;
pub mod pipeline;

pub use config::{BindgenConfig, InputConfig, MapConfig, OutputConfig, TargetsConfig, CONFIG_FILE};
pub use error::{BindgenError, Result};
pub use pipeline::{
    explore_stage, fails_build, run_pipeline, tree_path, write_artifacts, write_trees, ExploreOutput, PipelineOutput,
};
