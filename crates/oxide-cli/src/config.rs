//! CLI configuration management.

use oxide_cache::CompressionType;
use oxide_runner::WorkspaceLayout;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CliConfig {
    /// Cache directory, the user cache directory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Fallback job concurrency when neither flag nor template sets one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub workspace_layout: WorkspaceLayout,
    /// Compression for cache archives written by this host.
    #[serde(default)]
    pub compression: CompressionType,
    /// Timeout for steps that declare none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_timeout_seconds: Option<u64>,
    /// Output format.
    #[serde(default)]
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

impl CliConfig {
    /// Load configuration from file.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::config_path()?;
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let dirs = directories::ProjectDirs::from("ci", "oxide", "oxide-cli")
            .ok_or("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.yaml"))
    }

    /// Set a configuration value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "cache_dir" => self.cache_dir = Some(PathBuf::from(value)),
            "max_concurrency" => {
                let n: usize = value
                    .parse()
                    .map_err(|_| format!("Invalid max_concurrency: {}", value))?;
                if n == 0 {
                    return Err("max_concurrency must be at least 1".to_string());
                }
                self.max_concurrency = Some(n);
            }
            "workspace_layout" => {
                self.workspace_layout = match value {
                    "shared" => WorkspaceLayout::Shared,
                    "per_job" => WorkspaceLayout::PerJob,
                    _ => return Err(format!("Invalid workspace layout: {}", value)),
                };
            }
            "compression" => {
                self.compression = match value {
                    "none" => CompressionType::None,
                    "zstd" => CompressionType::Zstd,
                    _ => return Err(format!("Invalid compression: {}", value)),
                };
            }
            "step_timeout_seconds" => {
                self.step_timeout_seconds = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid step_timeout_seconds: {}", value))?,
                );
            }
            "output_format" => {
                self.output_format = match value {
                    "table" => OutputFormat::Table,
                    "json" => OutputFormat::Json,
                    "yaml" => OutputFormat::Yaml,
                    _ => return Err(format!("Invalid output format: {}", value)),
                };
            }
            _ => return Err(format!("Unknown config key: {}", key)),
        }
        Ok(())
    }
}
