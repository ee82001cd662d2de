//! Per-job step execution.
//!
//! A [`StepExecutor`] drives one job through its steps strictly in declared
//! order. The first failing step short-circuits the job: every later step is
//! recorded as skipped and never reaches the command collaborator. Cache
//! steps never fail a job; an unreachable store degrades to a miss.

use crate::environments::ExecutionEnvironment;
use crate::runner::{CommandExecutor, StepContext};
use oxide_cache::{CacheStore, CompressionType, compute_key, create_archive, extract_archive};
use oxide_core::pipeline::{StepDefinition, StepKind};
use oxide_core::run::{Job, JobStatus, StepResult};
use oxide_core::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Exit code recorded when the command collaborator could not be reached.
pub const COLLABORATOR_FAILURE_EXIT_CODE: i32 = -1;

/// Cache save scheduled by a missed restore, performed once the job
/// succeeds.
#[derive(Debug)]
struct PendingSave {
    key: String,
    paths: Vec<PathBuf>,
}

pub struct StepExecutor {
    commands: Arc<dyn CommandExecutor>,
    cache: Arc<dyn CacheStore>,
    compression: CompressionType,
}

impl StepExecutor {
    pub fn new(commands: Arc<dyn CommandExecutor>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            commands,
            cache,
            compression: CompressionType::default(),
        }
    }

    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Run `steps` for `job` inside `env`, mutating the job in place.
    ///
    /// Only a `pending` job is run; anything else is left untouched.
    pub async fn run(&self, job: &mut Job, steps: &[StepDefinition], env: &dyn ExecutionEnvironment) {
        if let Err(e) = job.transition(JobStatus::Running) {
            warn!(job_id = %job.id, platform = %job.platform, error = %e, "Refusing to run job");
            return;
        }

        info!(
            job_id = %job.id,
            platform = %job.platform,
            steps = steps.len(),
            "Starting job"
        );

        let mut failed = false;
        if let Err(e) = env.prepare().await {
            error!(platform = %job.platform, error = %e, "Failed to prepare execution environment");
            failed = true;
        }

        let mut pending_saves = Vec::new();
        for (idx, step) in steps.iter().enumerate() {
            if failed {
                debug!(platform = %job.platform, step = %step.name, "Skipping step after failure");
                job.record(StepResult::skipped(&step.name));
                continue;
            }

            info!(
                platform = %job.platform,
                step = %step.name,
                "Step {}/{}",
                idx + 1,
                steps.len()
            );

            let result = match step.kind {
                StepKind::CacheRestore => {
                    self.restore_cache(job, step, env.working_dir(), &mut pending_saves)
                        .await
                }
                _ => self.execute_command(job, step, env.working_dir()).await,
            };

            if let Err(e) = result.check() {
                warn!(platform = %job.platform, error = %e, "Step failed");
                failed = true;
            }
            job.record(result);
        }

        if !failed {
            for save in pending_saves {
                if let Err(e) = self.save_cache(&save, env.working_dir()).await {
                    warn!(platform = %job.platform, key = %save.key, error = %e, "Cache save failed");
                }
            }
        }

        if let Err(e) = env.cleanup().await {
            warn!(platform = %job.platform, error = %e, "Failed to clean up execution environment");
        }

        let status = if failed {
            JobStatus::Failed
        } else {
            JobStatus::Succeeded
        };
        if let Err(e) = job.transition(status) {
            error!(platform = %job.platform, error = %e, "Failed to finish job");
        }

        info!(
            job_id = %job.id,
            platform = %job.platform,
            status = %job.status,
            duration_ms = job.duration_ms().unwrap_or_default(),
            "Job finished"
        );
    }

    async fn execute_command(&self, job: &Job, step: &StepDefinition, workspace: &Path) -> StepResult {
        let start = Instant::now();
        let ctx = StepContext {
            platform: job.platform.clone(),
            workspace: workspace.to_path_buf(),
            variables: step_variables(job, step),
            step: step.clone(),
        };

        let exit_code = match self.commands.execute(&ctx).await {
            Ok(code) => code,
            Err(e) => {
                warn!(
                    platform = %job.platform,
                    step = %step.name,
                    error = %e,
                    "Command collaborator failed"
                );
                COLLABORATOR_FAILURE_EXIT_CODE
            }
        };

        StepResult::completed(&step.name, exit_code, start.elapsed().as_millis() as u64)
    }

    async fn restore_cache(
        &self,
        job: &Job,
        step: &StepDefinition,
        workspace: &Path,
        pending_saves: &mut Vec<PendingSave>,
    ) -> StepResult {
        let start = Instant::now();
        let prefix = step
            .cache
            .as_ref()
            .and_then(|c| c.key.as_deref())
            .unwrap_or(&step.name);
        let scope = format!("{}-{}", job.platform, prefix);
        let key = compute_key(step.cache_key_inputs(), &scope);

        let hit = match self.cache.get(&key).await {
            Ok(Some(blob)) => match self.unpack(blob, workspace).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(platform = %job.platform, key = %key, error = %e, "Cached blob unusable, treating as miss");
                    false
                }
            },
            Ok(None) => false,
            Err(e) => {
                warn!(platform = %job.platform, key = %key, error = %e, "Cache store unavailable, treating as miss");
                false
            }
        };

        info!(platform = %job.platform, step = %step.name, key = %key, hit, "Cache restore");

        if !hit {
            let paths = step
                .cache
                .as_ref()
                .map(|c| c.paths.iter().map(PathBuf::from).collect())
                .unwrap_or_default();
            pending_saves.push(PendingSave {
                key: key.clone(),
                paths,
            });
        }

        StepResult::cache_restore(&step.name, key, hit, start.elapsed().as_millis() as u64)
    }

    async fn unpack(&self, blob: Vec<u8>, workspace: &Path) -> Result<()> {
        let dest = workspace.to_path_buf();
        let compression = self.compression;
        tokio::task::spawn_blocking(move || extract_archive(blob.as_slice(), &dest, compression))
            .await
            .map_err(|e| Error::Internal(e.to_string()))?
    }

    async fn save_cache(&self, save: &PendingSave, workspace: &Path) -> Result<()> {
        let paths = save.paths.clone();
        let base = workspace.to_path_buf();
        let compression = self.compression;
        let blob = tokio::task::spawn_blocking(move || create_archive(&paths, &base, compression))
            .await
            .map_err(|e| Error::Internal(e.to_string()))??;

        let size = blob.len();
        self.cache.put(&save.key, blob).await?;
        info!(key = %save.key, size, "Cache saved");
        Ok(())
    }
}

/// Environment for one step: job variables, then step env, then built-ins.
fn step_variables(job: &Job, step: &StepDefinition) -> BTreeMap<String, String> {
    let mut vars = job.variables.clone();
    vars.extend(step.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    vars.insert("OXIDE_JOB_ID".to_string(), job.id.to_string());
    vars.insert("OXIDE_PLATFORM".to_string(), job.platform.clone());
    vars.insert("OXIDE_STEP".to_string(), step.name.clone());
    vars
}
