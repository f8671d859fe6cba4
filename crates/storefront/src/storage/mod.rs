//! Key-value storage backends for the local cache.
//!
//! The store is a flat string-to-string namespace shared by every service.
//! There is no locking across keys: the last writer wins. Two backends ship:
//!
//! - [`MemoryStore`] - process-local, gone on exit
//! - [`FileStore`] - one JSON document on disk, survives restarts (used by the CLI)

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file is not a JSON object of strings.
    #[error("storage file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A synchronous string key-value store.
///
/// Reads never fail; a backend that cannot read behaves as if the key were
/// absent. Writes report failures so the cache can log them.
pub trait KeyValueStore: Send + Sync {
    /// Get the raw value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot persist the value.
    fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Delete `key` if present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot persist the deletion.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Every key currently stored.
    fn keys(&self) -> Vec<String>;
}
