//! Command handlers.

use crate::commands::{EventArg, RunArgs};
use crate::config::CliConfig;
use crate::report;
use console::style;
use oxide_cache::{FilesystemStore, compute_key, resolve_hash_files};
use oxide_core::event::{EventDescriptor, EventKind};
use oxide_core::pipeline::{PipelineDefinition, TriggerRule};
use oxide_runner::{EnvironmentFactory, RunnerConfig, ShellRunner, StepExecutor};
use oxide_scheduler::{JobScheduler, PipelineEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Starter template: three platforms, checkout, cache restore, build, test.
pub const DEFAULT_TEMPLATE: &str = r#"name: ci

triggers:
  - type: manual
  - type: push
    paths: ["src/", "Cargo.toml", "Cargo.lock"]
  - type: pull_request
    branches: ["main"]

matrix:
  name: platform
  values: [linux, windows, macos]

steps:
  - name: checkout
    kind: checkout

  - name: cache
    kind: cache_restore
    cache:
      key: cargo
      hash_files: [Cargo.lock]
      paths: [target]

  - name: build
    kind: build
    run: cargo build --verbose

  - name: test
    kind: test
    run: cargo test --verbose
"#;

/// Initialize a new pipeline.
pub fn init(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        println!("{} {} already exists", style("!").yellow(), path.display());
        return Ok(());
    }

    std::fs::write(path, DEFAULT_TEMPLATE)?;
    println!("{} Created {}", style("✓").green(), path.display());
    Ok(())
}

/// Validate a pipeline configuration.
pub fn validate(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let definition = PipelineDefinition::from_file(path)?;

    println!(
        "{} Pipeline \"{}\" is valid",
        style("✓").green(),
        definition.name
    );

    let triggers: Vec<String> = definition
        .triggers
        .iter()
        .map(|rule| match rule {
            TriggerRule::Manual => "manual".to_string(),
            TriggerRule::Push { paths } => format!("push {:?}", paths),
            TriggerRule::PullRequest { branches } => format!("pull_request {:?}", branches),
        })
        .collect();
    println!("  Triggers: {}", triggers.join(", "));
    println!(
        "  Matrix: {} = [{}]",
        definition.matrix.name,
        definition.matrix.values.join(", ")
    );
    println!("  Steps: {}", definition.steps.len());
    for step in &definition.steps {
        println!("    - {} ({})", step.name, report::kind_label(step.kind));
    }

    Ok(())
}

/// Build the event descriptor described by the `run` flags.
pub fn event_from_args(args: &RunArgs) -> EventDescriptor {
    match args.event {
        EventArg::Manual => EventDescriptor::manual(),
        EventArg::Push => EventDescriptor::push(args.changed_paths.iter().cloned()),
        // A missing --branch is rejected by trigger evaluation.
        EventArg::PullRequest => EventDescriptor {
            kind: EventKind::PullRequest,
            changed_paths: None,
            target_branch: args.branch.clone(),
        },
    }
}

/// Run a pipeline locally. Returns whether the run succeeded; an event that
/// does not trigger counts as success.
pub async fn run_pipeline(
    config: &CliConfig,
    args: &RunArgs,
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut definition = PipelineDefinition::from_file(&args.path)?;
    let base_dir = template_dir(&args.path)?;
    resolve_hash_files(&mut definition, &base_dir)?;

    if let Some(n) = args
        .max_concurrency
        .or(definition.max_concurrency)
        .or(config.max_concurrency)
    {
        definition.max_concurrency = Some(n);
    }

    let store = match args.cache_dir.clone().or_else(|| config.cache_dir.clone()) {
        Some(dir) => FilesystemStore::new(dir),
        None => FilesystemStore::user_default()?,
    };
    debug!(cache_dir = %store.root_dir().display(), "Using filesystem cache");

    let runner = ShellRunner::new(RunnerConfig {
        timeout_seconds: config
            .step_timeout_seconds
            .or(RunnerConfig::default().timeout_seconds),
        ..Default::default()
    });
    let workspace = args.workspace.clone().unwrap_or(base_dir);
    let executor =
        StepExecutor::new(Arc::new(runner), Arc::new(store)).with_compression(config.compression);
    let environments = EnvironmentFactory::new(workspace, config.workspace_layout);
    let engine = PipelineEngine::new(JobScheduler::new(Arc::new(executor), environments));

    let event = event_from_args(args);
    info!(pipeline = %definition.name, event = %event.kind, "Evaluating event");

    let Some(report) = engine.handle_trigger(&definition, &event).await? else {
        println!(
            "{} Pipeline \"{}\" not triggered by {} event",
            style("i").blue(),
            definition.name,
            event.kind
        );
        return Ok(true);
    };

    let format = args.output.unwrap_or(config.output_format);
    print!("{}", report::render(&report, format)?);
    if !matches!(format, crate::config::OutputFormat::Table) {
        println!();
    }

    Ok(report.status.is_success())
}

fn template_dir(path: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(dir.to_path_buf()),
        _ => Ok(std::env::current_dir()?),
    }
}

/// Print the template JSON schema.
pub fn schema() -> Result<(), Box<dyn std::error::Error>> {
    let schema = schemars::schema_for!(PipelineDefinition);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

/// Print the key computed for `inputs` under `scope`.
pub fn cache_key(scope: &str, inputs: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", compute_key(inputs, scope));
    Ok(())
}

/// Clear cache.
pub async fn clear_cache(
    config: &CliConfig,
    cache_dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = match cache_dir.or_else(|| config.cache_dir.clone()) {
        Some(dir) => FilesystemStore::new(dir),
        None => FilesystemStore::user_default()?,
    };
    println!("Clearing cache at {}...", style(store.root_dir().display()).bold());
    store.clear().await?;
    println!("{} Cache cleared", style("✓").green());
    Ok(())
}

/// Show configuration.
pub fn show_config(config: &CliConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Current configuration:");
    println!(
        "  cache_dir: {}",
        config
            .cache_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "(default)".to_string())
    );
    println!(
        "  max_concurrency: {}",
        config
            .max_concurrency
            .map(|n| n.to_string())
            .unwrap_or_else(|| "(number of jobs)".to_string())
    );
    println!("  workspace_layout: {:?}", config.workspace_layout);
    println!("  compression: {:?}", config.compression);
    println!(
        "  step_timeout_seconds: {}",
        config
            .step_timeout_seconds
            .map(|n| n.to_string())
            .unwrap_or_else(|| "(default)".to_string())
    );
    println!("  output_format: {:?}", config.output_format);

    if let Ok(path) = CliConfig::config_path() {
        println!("\nConfig file: {}", path.display());
    }

    Ok(())
}

/// Set configuration.
pub fn set_config(key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = CliConfig::load().unwrap_or_default();
    config.set(key, value)?;
    config.save()?;

    println!("{} Set {} = {}", style("✓").green(), key, value);
    Ok(())
}
