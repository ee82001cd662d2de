//! Cache store trait and implementations.

use crate::keys::sanitize_key;
use async_trait::async_trait;
use oxide_core::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// External cache store shared by every job of a run.
///
/// Writes under an identical key are treated as idempotent: content-derived
/// keys make concurrent writers produce identical blobs, so the last writer
/// wins and no locking is required by callers.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the blob stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `blob` under `key`, replacing any previous entry.
    async fn put(&self, key: &str, blob: Vec<u8>) -> Result<()>;
}

/// In-process cache store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, blob: Vec<u8>) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), blob);
        Ok(())
    }
}

/// Filesystem-based cache store for local runs.
pub struct FilesystemStore {
    root_dir: PathBuf,
}

impl FilesystemStore {
    pub fn new(root_dir: PathBuf) -> Self {
        Self { root_dir }
    }

    /// Store rooted at the user cache directory.
    pub fn user_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("ci", "oxide", "oxide")
            .ok_or_else(|| Error::Internal("could not determine cache directory".to_string()))?;
        Ok(Self::new(dirs.cache_dir().join("blobs")))
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root_dir.join(format!("{}.blob", sanitize_key(key)))
    }

    /// Remove every stored entry.
    pub async fn clear(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.root_dir).await? {
            tokio::fs::remove_dir_all(&self.root_dir).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FilesystemStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.key_path(key);
        match tokio::fs::read(&path).await {
            Ok(blob) => {
                debug!(key, size = blob.len(), "Cache entry found");
                Ok(Some(blob))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::unavailable(format!(
                "failed to read cache entry {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn put(&self, key: &str, blob: Vec<u8>) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await.map_err(|e| {
            Error::unavailable(format!("failed to create cache dir: {}", e))
        })?;

        // Write then rename so concurrent readers never see a partial blob.
        let path = self.key_path(key);
        let tmp = path.with_extension(format!("tmp-{}", std::process::id()));
        tokio::fs::write(&tmp, &blob)
            .await
            .map_err(|e| Error::unavailable(format!("failed to write cache entry: {}", e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::unavailable(format!("failed to commit cache entry: {}", e)))?;

        debug!(key, size = blob.len(), "Cache entry saved");
        Ok(())
    }
}
