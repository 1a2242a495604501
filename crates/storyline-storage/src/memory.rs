//! In-memory storage implementation.

use crate::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// In-memory storage.
///
/// Values are kept as serialized JSON so that reads hand out independent
/// copies, the same way the file backend does. Nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    /// Create a new in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    /// Whether the storage holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key_to_string(key: &[&str]) -> String {
        key.join("/")
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read<T: DeserializeOwned + Send>(&self, key: &[&str]) -> StorageResult<Option<T>> {
        let key_str = Self::key_to_string(key);
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;

        match data.get(&key_str) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize + Send + Sync>(
        &self,
        key: &[&str],
        value: &T,
    ) -> StorageResult<()> {
        if key.is_empty() || key.iter().any(|c| c.is_empty() || c.contains('/')) {
            return Err(StorageError::invalid_key(format!("Invalid key: {key:?}")));
        }
        let key_str = Self::key_to_string(key);
        let json = serde_json::to_string(value)?;

        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        data.insert(key_str, json);

        Ok(())
    }

    async fn remove(&self, key: &[&str]) -> StorageResult<()> {
        let key_str = Self::key_to_string(key);
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        data.remove(&key_str);
        Ok(())
    }

    async fn list(&self, prefix: &[&str]) -> StorageResult<Vec<Vec<String>>> {
        let prefix_with_sep = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", Self::key_to_string(prefix))
        };

        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;

        // BTreeMap iteration keeps the result sorted.
        let results = data
            .range(prefix_with_sep.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix_with_sep))
            .filter_map(|(k, _)| {
                let remainder = &k[prefix_with_sep.len()..];
                // Only direct children
                if remainder.contains('/') {
                    return None;
                }
                Some(k.split('/').map(|s| s.to_string()).collect())
            })
            .collect();

        Ok(results)
    }

    async fn exists(&self, key: &[&str]) -> StorageResult<bool> {
        let key_str = Self::key_to_string(key);
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        Ok(data.contains_key(&key_str))
    }
}
