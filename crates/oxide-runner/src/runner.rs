//! Command-execution collaborator trait and types.

use async_trait::async_trait;
use oxide_core::Result;
use oxide_core::pipeline::StepDefinition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Context handed to the command collaborator for one step of one job.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub platform: String,
    pub workspace: PathBuf,
    /// Pipeline variables, matrix variables and step env, later entries
    /// overriding earlier ones.
    pub variables: BTreeMap<String, String>,
    pub step: StepDefinition,
}

/// Opaque boundary that runs a step's command and reports its exit status.
///
/// An `Err` means the collaborator itself could not be reached; a command
/// that ran and failed is an `Ok` with a non-zero exit code.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, ctx: &StepContext) -> Result<i32>;
}

/// Configuration for step execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Fallback timeout for steps that declare none.
    pub timeout_seconds: Option<u64>,
    pub shell: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: Some(3600), // 1 hour default
            shell: "sh".to_string(),
        }
    }
}
