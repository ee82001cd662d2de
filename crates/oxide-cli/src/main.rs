//! Oxide command-line entrypoint.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod handlers;
mod report;


use commands::{CacheCommands, Commands, ConfigCommands, LogFormat};
use config::CliConfig;

#[derive(Parser)]
#[command(name = "oxide")]
#[command(author, version, about = "Oxide pipeline engine command-line interface", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Exit code for a run that finished with failed jobs.
const EXIT_RUN_FAILED: u8 = 1;
/// Exit code for malformed templates and events.
const EXIT_CONFIGURATION: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let config = CliConfig::load().unwrap_or_default();

    match dispatch(cli.command, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_RUN_FAILED),
        Err(e) => {
            eprintln!("{} {}", style("✗").red().bold(), e);
            let is_configuration = e
                .downcast_ref::<oxide_core::Error>()
                .is_some_and(|e| e.is_configuration());
            if is_configuration {
                ExitCode::from(EXIT_CONFIGURATION)
            } else {
                ExitCode::from(EXIT_RUN_FAILED)
            }
        }
    }
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.with_target(false).init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn dispatch(command: Commands, config: &CliConfig) -> Result<bool, Box<dyn std::error::Error>> {
    match command {
        Commands::Init { path, force } => handlers::init(&path, force)?,
        Commands::Validate { path } => handlers::validate(&path)?,
        Commands::Run(args) => return handlers::run_pipeline(config, &args).await,
        Commands::Schema => handlers::schema()?,
        Commands::Cache { command } => match command {
            CacheCommands::Key { scope, inputs } => handlers::cache_key(&scope, &inputs)?,
            CacheCommands::Clear { cache_dir } => handlers::clear_cache(config, cache_dir).await?,
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => handlers::show_config(config)?,
            ConfigCommands::Set { key, value } => handlers::set_config(&key, &value)?,
        },
    }

    Ok(true)
}
