//! Storage layer for storyline.
//!
//! Stories, versions and snapshots are persisted through a small key-value
//! abstraction with two backends:
//! - JSON file storage (one file per key, atomic replace on write)
//! - In-memory storage (for tests and ephemeral libraries)

pub mod error;
pub mod json;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use json::JsonStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// A trait for key-value storage backends.
///
/// Keys are represented as path segments, e.g. `["version", "sty_123", "ver_456"]`.
/// Values are serialized/deserialized as JSON. A write to a single key is
/// atomic: readers observe either the old or the new value, never a mix.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a value from storage.
    ///
    /// Returns `None` if the key doesn't exist.
    async fn read<T: DeserializeOwned + Send>(&self, key: &[&str]) -> StorageResult<Option<T>>;

    /// Write a value to storage, replacing any previous value.
    async fn write<T: Serialize + Send + Sync>(&self, key: &[&str], value: &T)
        -> StorageResult<()>;

    /// Remove a value from storage. Removing a missing key is not an error.
    async fn remove(&self, key: &[&str]) -> StorageResult<()>;

    /// List the direct children of a prefix, sorted by key.
    ///
    /// Returns the full key paths for each item.
    async fn list(&self, prefix: &[&str]) -> StorageResult<Vec<Vec<String>>>;

    /// Check if a key exists.
    async fn exists(&self, key: &[&str]) -> StorageResult<bool>;

    /// Read every value stored directly under a prefix, in key order.
    async fn read_all<T: DeserializeOwned + Send>(&self, prefix: &[&str]) -> StorageResult<Vec<T>> {
        let keys = self.list(prefix).await?;
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let key_refs: Vec<&str> = key.iter().map(|s| s.as_str()).collect();
            if let Some(value) = self.read::<T>(&key_refs).await? {
                values.push(value);
            }
        }
        Ok(values)
    }
}
