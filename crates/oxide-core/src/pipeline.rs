//! Pipeline template types.
//!
//! These types represent the user-authored pipeline YAML: trigger rules, a
//! single matrix axis and the ordered step sequence shared by every job.

use crate::event::EventKind;
use crate::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PipelineDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub triggers: Vec<TriggerRule>,
    pub matrix: MatrixAxis,
    pub steps: Vec<StepDefinition>,
    /// Upper bound on concurrently running jobs. Defaults to the number of
    /// jobs.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    /// Variables exported to every step's environment.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl PipelineDefinition {
    /// Parse and validate a template from YAML.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let definition: PipelineDefinition = serde_yaml::from_str(content)
            .map_err(|e| Error::configuration(format!("invalid pipeline template: {}", e)))?;
        definition.validate()?;
        Ok(definition)
    }

    /// Read, parse and validate a template file.
    ///
    /// An unreadable file is a configuration error, same as a malformed one.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::configuration("pipeline name must not be empty"));
        }

        let mut kinds = HashSet::new();
        for rule in &self.triggers {
            if !kinds.insert(rule.kind()) {
                return Err(Error::configuration(format!(
                    "duplicate trigger rule for event kind '{}'",
                    rule.kind()
                )));
            }
        }

        self.matrix.validate()?;

        if self.steps.is_empty() {
            return Err(Error::configuration("pipeline must declare at least one step"));
        }

        let mut names = HashSet::new();
        for step in &self.steps {
            if !names.insert(step.name.as_str()) {
                return Err(Error::configuration(format!(
                    "duplicate step name '{}'",
                    step.name
                )));
            }
            step.validate()?;
        }

        if self.max_concurrency == Some(0) {
            return Err(Error::configuration("max_concurrency must be at least 1"));
        }

        Ok(())
    }

    /// Look up the rule configured for an event kind.
    pub fn trigger_for(&self, kind: EventKind) -> Option<&TriggerRule> {
        self.triggers.iter().find(|rule| rule.kind() == kind)
    }
}

/// One trigger rule per event kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerRule {
    Manual,
    Push {
        /// Literal path prefixes; a changed path matches when one of these
        /// is a prefix of it.
        #[serde(default)]
        paths: Vec<String>,
    },
    PullRequest {
        #[serde(default)]
        branches: Vec<String>,
    },
}

impl TriggerRule {
    pub fn kind(&self) -> EventKind {
        match self {
            TriggerRule::Manual => EventKind::Manual,
            TriggerRule::Push { .. } => EventKind::Push,
            TriggerRule::PullRequest { .. } => EventKind::PullRequest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MatrixAxis {
    #[serde(default = "default_axis_name")]
    pub name: String,
    pub values: Vec<String>,
}

fn default_axis_name() -> String {
    "platform".to_string()
}

impl MatrixAxis {
    pub fn platforms<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: default_axis_name(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.values.is_empty() {
            return Err(Error::configuration(format!(
                "matrix axis '{}' must not be empty",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for value in &self.values {
            if value.trim().is_empty() {
                return Err(Error::configuration(format!(
                    "matrix axis '{}' contains an empty value",
                    self.name
                )));
            }
            if !seen.insert(value.as_str()) {
                return Err(Error::configuration(format!(
                    "matrix axis '{}' contains duplicate value '{}'",
                    self.name, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Checkout,
    CacheRestore,
    Build,
    Test,
    #[default]
    Generic,
}

impl StepKind {
    /// Whether steps of this kind need a `run` command.
    pub fn requires_command(&self) -> bool {
        matches!(self, StepKind::Build | StepKind::Test | StepKind::Generic)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StepDefinition {
    pub name: String,
    #[serde(default)]
    pub kind: StepKind,
    #[serde(default)]
    pub run: Option<String>,
    #[serde(default)]
    pub cache: Option<CacheStepConfig>,
    #[serde(default)]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout_minutes: Option<u32>,
}

impl StepDefinition {
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            run: None,
            cache: None,
            working_directory: None,
            env: BTreeMap::new(),
            timeout_minutes: None,
        }
    }

    pub fn with_run(mut self, command: impl Into<String>) -> Self {
        self.run = Some(command.into());
        self
    }

    pub fn with_cache(mut self, cache: CacheStepConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Content hashes feeding the cache key, in declaration order.
    pub fn cache_key_inputs(&self) -> &[String] {
        self.cache
            .as_ref()
            .map(|c| c.key_inputs.as_slice())
            .unwrap_or(&[])
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::configuration("step name must not be empty"));
        }
        if self.kind.requires_command() && self.run.as_deref().is_none_or(|r| r.trim().is_empty())
        {
            return Err(Error::configuration(format!(
                "step '{}' requires a 'run' command",
                self.name
            )));
        }
        if self.kind == StepKind::CacheRestore && self.cache.is_none() {
            return Err(Error::configuration(format!(
                "cache step '{}' requires a 'cache' block",
                self.name
            )));
        }
        Ok(())
    }
}

/// Cache settings of a `cache_restore` step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CacheStepConfig {
    /// Key prefix; the step name is used when absent.
    #[serde(default)]
    pub key: Option<String>,
    /// Files whose content hashes are prepended to `key_inputs` before the
    /// run starts.
    #[serde(default)]
    pub hash_files: Vec<String>,
    /// Content hashes feeding the cache key.
    #[serde(default)]
    pub key_inputs: Vec<String>,
    /// Paths, relative to the job's working directory, saved after a miss.
    #[serde(default)]
    pub paths: Vec<String>,
}
