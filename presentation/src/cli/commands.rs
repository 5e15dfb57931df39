//! CLI command definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for execution results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary with captured output and call log
    Text,
    /// The full execution result as JSON
    Json,
}

/// CLI arguments for toolscript
#[derive(Parser, Debug)]
#[command(name = "toolscript")]
#[command(author, version, about = "Run sandboxed Lua scripts against a catalog of tools")]
#[command(long_about = r#"
toolscript runs a Lua script that calls tools through generated stub modules.

Every script is checked before it runs, executes under memory, time and
call limits, and reaches tools only through a router that adds retries,
circuit breaking and idempotent replay.

Configuration files are loaded from (in priority order):
1. TOOLSCRIPT_* environment variables
2. --config <path>        Explicit config file
3. ./toolscript.toml      Project-level config
4. ~/.config/toolscript/config.toml   Global config

Example:
  toolscript run report.lua --catalog tools.toml
  toolscript validate report.lua
  toolscript stubs --catalog tools.toml --signatures
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate and execute a script
    Run(RunArgs),

    /// Check a script against the sandbox policy without running it
    Validate {
        /// Script file
        script: PathBuf,
    },

    /// Print the stub modules generated from a catalog
    Stubs {
        /// Tool catalog file (TOML)
        #[arg(long, value_name = "PATH")]
        catalog: PathBuf,

        /// Only this domain
        #[arg(long, value_name = "DOMAIN")]
        domain: Option<String>,

        /// Print function signatures instead of module source
        #[arg(long)]
        signatures: bool,
    },

    /// Show configuration file locations in priority order
    Config,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Script file
    pub script: PathBuf,

    /// Tool catalog file (TOML)
    #[arg(long, value_name = "PATH")]
    pub catalog: PathBuf,

    /// Wall-clock limit for the whole execution
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Maximum number of tool calls
    #[arg(long, value_name = "N")]
    pub max_calls: Option<usize>,

    /// Directory exposed to the script as `scratch`
    #[arg(long, value_name = "DIR")]
    pub scratch: Option<PathBuf>,

    /// Append execution events to this JSONL file
    #[arg(long, value_name = "PATH")]
    pub events: Option<PathBuf>,

    /// Output format (defaults to the configured format, then text)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,
}
