//! Key-value storage medium.

use crate::error::{StorageError, StorageResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::RwLock;

/// A string key-value store that survives (or, for [`MemoryStore`], models)
/// process restarts.
///
/// Implementations must make each `put`/`delete` atomic. `put_batch` should
/// be atomic across keys where the backend can do so; the default falls back
/// to sequential puts.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value under `key`, if any.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Stores several values.
    fn put_batch(&self, entries: &[(&str, String)]) -> StorageResult<()> {
        for (key, value) in entries {
            self.put(key, value)?;
        }
        Ok(())
    }

    /// Backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Reads and decodes a JSON value, returning `None` when the key is absent.
pub(crate) fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StorageResult<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encodes a value as JSON.
pub(crate) fn to_json<T: Serialize>(value: &T) -> StorageResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Process-local store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.values.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let values = self.values.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut values = self.values.write().map_err(|_| StorageError::LockPoisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let mut values = self.values.write().map_err(|_| StorageError::LockPoisoned)?;
        values.remove(key);
        Ok(())
    }

    fn put_batch(&self, entries: &[(&str, String)]) -> StorageResult<()> {
        let mut values = self.values.write().map_err(|_| StorageError::LockPoisoned)?;
        for (key, value) in entries {
            values.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
