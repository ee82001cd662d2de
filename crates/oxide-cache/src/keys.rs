//! Cache key generation utilities.

use oxide_core::pipeline::PipelineDefinition;
use oxide_core::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Number of digest bytes kept in a key.
const KEY_HASH_BYTES: usize = 16;

/// Compute a cache key from ordered content hashes and a scope.
///
/// Inputs are hashed in the given order and never sorted. Each input is
/// followed by a NUL separator so that shifting characters between adjacent
/// inputs changes the key.
pub fn compute_key<S: AsRef<str>>(inputs: &[S], scope: &str) -> String {
    let mut hasher = Sha256::new();
    for input in inputs {
        hasher.update(input.as_ref().as_bytes());
        hasher.update([0u8]);
    }
    let hash = hasher.finalize();
    format!("{}-{}", scope, hex::encode(&hash[..KEY_HASH_BYTES]))
}

/// Content hash (hex SHA-256) of a file.
pub fn hash_file(path: &Path) -> Result<String> {
    let contents = std::fs::read(path).map_err(|e| {
        Error::configuration(format!("cannot hash '{}': {}", path.display(), e))
    })?;
    Ok(hex::encode(Sha256::digest(&contents)))
}

/// Turn every cache step's `hash_files` into content hashes, relative to
/// `base_dir`, and prepend them to the step's `key_inputs`.
///
/// Runs once before the run starts so that every job sees identical inputs.
pub fn resolve_hash_files(definition: &mut PipelineDefinition, base_dir: &Path) -> Result<()> {
    for step in &mut definition.steps {
        let Some(cache) = step.cache.as_mut() else {
            continue;
        };
        if cache.hash_files.is_empty() {
            continue;
        }
        let mut inputs = Vec::with_capacity(cache.hash_files.len() + cache.key_inputs.len());
        for file in &cache.hash_files {
            inputs.push(hash_file(&base_dir.join(file))?);
        }
        inputs.append(&mut cache.key_inputs);
        cache.key_inputs = inputs;
        cache.hash_files.clear();
    }
    Ok(())
}

/// Sanitize a key for use in filenames.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
