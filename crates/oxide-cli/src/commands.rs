//! CLI command definitions.

use crate::config::OutputFormat;
use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter pipeline template
    Init {
        /// Where to write the template
        #[arg(default_value = "oxide.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Validate pipeline configuration
    Validate {
        /// Path to pipeline file
        #[arg(default_value = "oxide.yaml")]
        path: PathBuf,
    },

    /// Evaluate an event against a pipeline and run it locally
    Run(RunArgs),

    /// Print the JSON schema of the pipeline template
    Schema,

    /// Manage cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to pipeline file
    #[arg(default_value = "oxide.yaml")]
    pub path: PathBuf,

    /// Kind of triggering event
    #[arg(short, long, value_enum, default_value_t = EventArg::Manual)]
    pub event: EventArg,

    /// Changed path for push events (repeatable)
    #[arg(long = "changed-path")]
    pub changed_paths: Vec<String>,

    /// Target branch for pull request events
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Maximum number of jobs running at once
    #[arg(short = 'j', long)]
    pub max_concurrency: Option<usize>,

    /// Cache directory (defaults to the user cache directory)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Workspace root (defaults to the template's directory)
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventArg {
    Manual,
    Push,
    PullRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Print the cache key for ordered content hashes
    Key {
        /// Key scope, e.g. linux-cargo
        #[arg(short, long)]
        scope: String,

        /// Content hashes in declaration order
        inputs: Vec<String>,
    },

    /// Clear cache
    Clear {
        /// Cache directory (defaults to the configured one)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set configuration value
    Set {
        /// Key
        key: String,

        /// Value
        value: String,
    },
}
