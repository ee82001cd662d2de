//! Execution environment management.

use async_trait::async_trait;
use oxide_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Engine-owned directory under the workspace root, never copied into jobs.
pub const STATE_DIR: &str = ".oxide";

/// Environment a single job executes in.
#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    /// Prepare the execution environment.
    async fn prepare(&self) -> Result<()>;

    /// Get the working directory.
    fn working_dir(&self) -> &Path;

    /// Cleanup the execution environment.
    async fn cleanup(&self) -> Result<()>;
}

/// Host environment (runs directly on the machine running the engine).
pub struct HostEnvironment {
    workspace: PathBuf,
    seed: Option<PathBuf>,
    remove_on_cleanup: bool,
}

impl HostEnvironment {
    pub fn new(workspace: PathBuf) -> Self {
        Self {
            workspace,
            seed: None,
            remove_on_cleanup: false,
        }
    }

    /// A scratch workspace filled with a private copy of `source` on prepare,
    /// removed again once the job is done.
    pub fn isolated(workspace: PathBuf, source: PathBuf) -> Self {
        Self {
            workspace,
            seed: Some(source),
            remove_on_cleanup: true,
        }
    }
}

/// Copy `source` into `dest`, skipping the top-level state directory.
fn copy_tree(source: &Path, dest: &Path) -> Result<usize> {
    let mut copied = 0;
    let walker = WalkDir::new(source)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && e.file_name() == STATE_DIR));

    for entry in walker {
        let entry = entry
            .map_err(|e| Error::unavailable(format!("Failed to walk workspace: {}", e)))?;
        let rel = entry.path().strip_prefix(source).map_err(|_| {
            Error::Internal(format!(
                "{} is not under {}",
                entry.path().display(),
                source.display()
            ))
        })?;
        let target = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        } else if file_type.is_symlink() {
            #[cfg(unix)]
            std::os::unix::fs::symlink(std::fs::read_link(entry.path())?, &target)?;
            #[cfg(not(unix))]
            debug!(path = %entry.path().display(), "Skipping symlink");
        }
    }
    Ok(copied)
}

#[async_trait]
impl ExecutionEnvironment for HostEnvironment {
    async fn prepare(&self) -> Result<()> {
        info!(workspace = %self.workspace.display(), "Preparing host environment");
        if self.seed.is_some() && tokio::fs::try_exists(&self.workspace).await? {
            // Leftovers from an interrupted run.
            tokio::fs::remove_dir_all(&self.workspace).await?;
        }
        tokio::fs::create_dir_all(&self.workspace)
            .await
            .map_err(|e| Error::unavailable(format!("Failed to create workspace: {}", e)))?;

        if let Some(source) = &self.seed {
            let source = source.clone();
            let dest = self.workspace.clone();
            let copied = tokio::task::spawn_blocking(move || copy_tree(&source, &dest))
                .await
                .map_err(|e| Error::Internal(format!("Workspace copy task failed: {}", e)))??;
            debug!(workspace = %self.workspace.display(), files = copied, "Seeded job workspace");
        }
        Ok(())
    }

    fn working_dir(&self) -> &Path {
        &self.workspace
    }

    async fn cleanup(&self) -> Result<()> {
        if self.remove_on_cleanup {
            debug!(workspace = %self.workspace.display(), "Removing scratch workspace");
            tokio::fs::remove_dir_all(&self.workspace).await?;
        }
        Ok(())
    }
}

/// How job workspaces are laid out on the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceLayout {
    /// Every job runs in the workspace root. Jobs are run one at a time.
    Shared,
    /// Each job gets its own copy of the root in `<root>/.oxide/jobs/<platform>`,
    /// removed afterwards.
    #[default]
    PerJob,
}

/// Factory for creating one execution environment per job.
#[derive(Debug, Clone)]
pub struct EnvironmentFactory {
    root: PathBuf,
    layout: WorkspaceLayout,
}

impl EnvironmentFactory {
    pub fn new(root: PathBuf, layout: WorkspaceLayout) -> Self {
        Self { root, layout }
    }

    pub fn layout(&self) -> WorkspaceLayout {
        self.layout
    }

    pub fn create(&self, platform: &str) -> Box<dyn ExecutionEnvironment> {
        match self.layout {
            WorkspaceLayout::Shared => Box::new(HostEnvironment::new(self.root.clone())),
            WorkspaceLayout::PerJob => Box::new(HostEnvironment::isolated(
                self.root.join(STATE_DIR).join("jobs").join(platform),
                self.root.clone(),
            )),
        }
    }
}
