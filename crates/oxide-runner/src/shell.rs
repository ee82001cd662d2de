//! Shell-based step execution on the host.

use crate::runner::{CommandExecutor, RunnerConfig, StepContext};
use async_trait::async_trait;
use oxide_core::pipeline::StepKind;
use oxide_core::{Error, Result};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::{Duration, timeout};
use tracing::{debug, info, warn};

/// Exit code reported when a command exceeds its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Shell runner for executing commands on the host.
pub struct ShellRunner {
    config: RunnerConfig,
}

impl ShellRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    fn step_timeout(&self, ctx: &StepContext) -> Option<Duration> {
        ctx.step
            .timeout_minutes
            .map(|m| Duration::from_secs(u64::from(m) * 60))
            .or_else(|| self.config.timeout_seconds.map(Duration::from_secs))
    }

    async fn execute_command(&self, command: &str, ctx: &StepContext) -> Result<i32> {
        let start = std::time::Instant::now();
        let workdir = match &ctx.step.working_directory {
            Some(dir) => ctx.workspace.join(dir),
            None => ctx.workspace.clone(),
        };

        info!(
            platform = %ctx.platform,
            step = %ctx.step.name,
            command = %command,
            workspace = %workdir.display(),
            "Executing shell command"
        );

        let mut child = Command::new(&self.config.shell)
            .arg("-c")
            .arg(command)
            .current_dir(&workdir)
            .envs(&ctx.variables)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::unavailable(format!("failed to spawn {}: {}", self.config.shell, e)))?;

        let stdout_handle = child
            .stdout
            .take()
            .map(|out| tokio::spawn(forward_lines(out, ctx.step.name.clone(), "stdout")));
        let stderr_handle = child
            .stderr
            .take()
            .map(|err| tokio::spawn(forward_lines(err, ctx.step.name.clone(), "stderr")));

        let wait_result = match self.step_timeout(ctx) {
            Some(limit) => match timeout(limit, child.wait()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(step = %ctx.step.name, timeout_secs = limit.as_secs(), "Command timed out, killing process");
                    let _ = child.kill().await;
                    return Ok(TIMEOUT_EXIT_CODE);
                }
            },
            None => child.wait().await,
        };

        // Wait for output forwarding to complete
        if let Some(handle) = stdout_handle {
            let _ = handle.await;
        }
        if let Some(handle) = stderr_handle {
            let _ = handle.await;
        }

        let status = wait_result
            .map_err(|e| Error::unavailable(format!("failed to wait for process: {}", e)))?;
        let exit_code = status.code().unwrap_or(-1);

        debug!(
            step = %ctx.step.name,
            exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "Command completed"
        );

        Ok(exit_code)
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, step: String, stream: &'static str) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        info!(step = %step, stream, "{}", line);
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

#[async_trait]
impl CommandExecutor for ShellRunner {
    async fn execute(&self, ctx: &StepContext) -> Result<i32> {
        match (ctx.step.run.as_deref(), ctx.step.kind) {
            (Some(command), _) => self.execute_command(command, ctx).await,
            // The host workspace already is the checkout.
            (None, StepKind::Checkout) => {
                debug!(step = %ctx.step.name, "Checkout without command, using workspace as-is");
                Ok(0)
            }
            (None, _) => Err(Error::configuration(format!(
                "step '{}' has no command to run",
                ctx.step.name
            ))),
        }
    }
}
