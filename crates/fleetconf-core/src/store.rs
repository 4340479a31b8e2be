//! Snapshot storage abstraction.
//!
//! The reconciliation engine keeps three named documents: the remote
//! snapshot, the bootstrap seed, and the effective configuration. This module
//! provides the trait for storing them so platforms can differ:
//! - Linux: files in a data directory with atomic replace
//! - Embedded: flash filesystem or NVS
//! - Tests: in memory
//!
//! All methods are synchronous to support embedded platforms. Writes are full
//! replacements; there are no partial updates.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::ConfigError;

/// Named text blob storage.
pub trait SnapshotStore: Send + Sync {
    /// Read the text stored under `key`. `Ok(None)` when absent.
    fn read(&self, key: &str) -> Result<Option<String>, ConfigError>;

    /// Replace the text stored under `key`.
    fn write(&self, key: &str, text: &str) -> Result<(), ConfigError>;

    /// Remove `key`. Deleting an absent key succeeds.
    fn delete(&self, key: &str) -> Result<(), ConfigError>;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for &T {
    fn read(&self, key: &str) -> Result<Option<String>, ConfigError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, text: &str) -> Result<(), ConfigError> {
        (**self).write(key, text)
    }

    fn delete(&self, key: &str) -> Result<(), ConfigError> {
        (**self).delete(key)
    }
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for Arc<T> {
    fn read(&self, key: &str) -> Result<Option<String>, ConfigError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, text: &str) -> Result<(), ConfigError> {
        (**self).write(key, text)
    }

    fn delete(&self, key: &str) -> Result<(), ConfigError> {
        (**self).delete(key)
    }
}

/// In-memory snapshot store.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    data: RwLock<HashMap<String, String>>,
}

impl MemorySnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`.
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let data = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            data: RwLock::new(data),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn read(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let data = self
            .data
            .read()
            .map_err(|_| ConfigError::local_store(key, "store lock poisoned"))?;
        Ok(data.get(key).cloned())
    }

    fn write(&self, key: &str, text: &str) -> Result<(), ConfigError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| ConfigError::persist(key, "store lock poisoned"))?;
        data.insert(key.to_string(), text.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), ConfigError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| ConfigError::persist(key, "store lock poisoned"))?;
        data.remove(key);
        Ok(())
    }
}
