//! Cache key resolution and cache stores for the Oxide pipeline engine.

pub mod archiver;
pub mod keys;
pub mod provider;

pub use archiver::{CompressionType, create_archive, extract_archive};
pub use keys::{compute_key, hash_file, resolve_hash_files, sanitize_key};
pub use provider::{CacheStore, FilesystemStore, MemoryStore};
