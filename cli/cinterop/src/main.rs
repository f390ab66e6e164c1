//! cinterop CLI: explore C headers per platform, unify and map them.

mod commands;

use std::path::{Path, PathBuf};
use std::process;

use cinterop_bindgen::BindgenConfig;
use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cinterop", version, about = "Cross-platform C header exploration for bindings")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a cinterop.toml template
    Init {
        /// Header the configuration points at
        #[arg(long, default_value = "include/api.h")]
        header: String,
        /// Directory to write cinterop.toml into (default: current directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Explore the configured header and write one AST per platform
    Explore {
        /// Output directory (default: [output] directory from cinterop.toml)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Unify per-platform AST files into a cross-platform bundle
    Unify {
        /// AST files written by `cinterop explore`
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Bundle file to write
        #[arg(long, default_value = "bundle.json")]
        output: PathBuf,
        /// Entry point every platform must declare (repeatable)
        #[arg(long = "require")]
        required: Vec<String>,
    },
    /// Map a bundle into a binding model
    Map {
        /// Bundle file written by `cinterop unify`
        input: PathBuf,
        /// Model file to write
        #[arg(long, default_value = "model.json")]
        output: PathBuf,
    },
    /// Run the whole pipeline from cinterop.toml
    Bindgen {
        /// Output directory (default: [output] directory from cinterop.toml)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Fail on warnings as well as errors
        #[arg(long)]
        fail_on_warnings: bool,
    },
    /// Inspect target platforms
    Targets {
        #[command(subcommand)]
        action: TargetsAction,
    },
}

#[derive(Subcommand)]
enum TargetsAction {
    /// List built-in target platforms
    List,
    /// Show the ABI facts of a target
    Describe {
        /// Target triple (e.g. x86_64-pc-windows-msvc)
        triple: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init { header, dir } => commands::init::run(&dir.unwrap_or(cwd), &header),

        Commands::Explore { output } => {
            let (config, project_dir) = load_config_required(&cwd)?;
            commands::explore::run(&config, &project_dir, output.as_deref())
        }

        Commands::Unify {
            inputs,
            output,
            required,
        } => commands::unify::run(&inputs, &output, &required),

        Commands::Map { input, output } => {
            let config = load_config_optional(&cwd)?.map(|(config, _)| config);
            commands::map::run(config.as_ref(), &input, &output)
        }

        Commands::Bindgen {
            output,
            fail_on_warnings,
        } => {
            let (config, project_dir) = load_config_required(&cwd)?;
            commands::bindgen::run(&config, &project_dir, output.as_deref(), fail_on_warnings)
        }

        Commands::Targets { action } => match action {
            TargetsAction::List => commands::targets::list(),
            TargetsAction::Describe { triple } => commands::targets::describe(&triple),
        },
    }
}

/// Load the configuration from the current directory upward. Errors if not found.
fn load_config_required(cwd: &Path) -> anyhow::Result<(BindgenConfig, PathBuf)> {
    match load_config_optional(cwd)? {
        Some(found) => Ok(found),
        None => anyhow::bail!("no cinterop.toml found (run `cinterop init` first)"),
    }
}

fn load_config_optional(cwd: &Path) -> anyhow::Result<Option<(BindgenConfig, PathBuf)>> {
    Ok(BindgenConfig::find_and_load(cwd)?)
}
