//! Tar archives used as cache blobs.

use oxide_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Compression applied to cache archives.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    None,
    #[default]
    Zstd,
}

const ZSTD_LEVEL: i32 = 3;

/// Pack `paths` (relative to `base_dir`) into an in-memory archive.
/// Paths that do not exist are skipped.
pub fn create_archive(
    paths: &[PathBuf],
    base_dir: &Path,
    compression: CompressionType,
) -> Result<Vec<u8>> {
    match compression {
        CompressionType::Zstd => {
            let mut encoder = zstd::stream::write::Encoder::new(Vec::new(), ZSTD_LEVEL)
                .map_err(|e| Error::Internal(format!("Zstd init failed: {}", e)))?;
            append_paths(&mut encoder, paths, base_dir)?;
            encoder
                .finish()
                .map_err(|e| Error::Internal(format!("Zstd finish failed: {}", e)))
        }
        CompressionType::None => {
            let mut buffer = Vec::new();
            append_paths(&mut buffer, paths, base_dir)?;
            Ok(buffer)
        }
    }
}

fn append_paths<W: Write>(writer: W, paths: &[PathBuf], base_dir: &Path) -> Result<()> {
    let mut builder = tar::Builder::new(writer);
    for p in paths {
        let abs_path = if p.is_absolute() {
            p.clone()
        } else {
            base_dir.join(p)
        };
        if !abs_path.exists() {
            continue;
        }
        let name = if p.is_absolute() {
            p.strip_prefix(base_dir).unwrap_or(p)
        } else {
            p.as_path()
        };

        if abs_path.is_dir() {
            builder
                .append_dir_all(name, &abs_path)
                .map_err(|e| Error::Internal(format!("Failed to pack dir: {}", e)))?;
        } else {
            builder
                .append_path_with_name(&abs_path, name)
                .map_err(|e| Error::Internal(format!("Failed to pack file: {}", e)))?;
        }
    }
    builder
        .finish()
        .map_err(|e| Error::Internal(format!("Failed to finish tar: {}", e)))
}

/// Extract an archive into `dest`.
pub fn extract_archive<R: Read>(reader: R, dest: &Path, compression: CompressionType) -> Result<()> {
    match compression {
        CompressionType::Zstd => {
            let decoder = zstd::stream::read::Decoder::new(reader)
                .map_err(|e| Error::Internal(format!("Failed to create decoder: {}", e)))?;
            tar::Archive::new(decoder)
                .unpack(dest)
                .map_err(|e| Error::Internal(format!("Failed to unpack archive: {}", e)))
        }
        CompressionType::None => tar::Archive::new(reader)
            .unpack(dest)
            .map_err(|e| Error::Internal(format!("Failed to unpack archive: {}", e))),
    }
}
