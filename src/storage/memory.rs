//! In-memory settings backend.
//!
//! Thread-safe and non-durable. Intended for embedded usage and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use super::traits::{SettingsBatch, SettingsOp, SettingsStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

/// Thread-safe in-memory settings store.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    values: RwLock<HashMap<String, Value>>,
}

impl InMemorySettingsStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.values.read().map_err(|_| lock_err("settings.len"))?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let values = self.values.read().map_err(|_| lock_err("settings.get"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut values = self.values.write().map_err(|_| lock_err("settings.set"))?;
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.write().map_err(|_| lock_err("settings.delete"))?;
        values.remove(key);
        Ok(())
    }

    fn apply(&self, batch: SettingsBatch) -> Result<(), StorageError> {
        let mut values = self.values.write().map_err(|_| lock_err("settings.apply"))?;
        for op in batch.into_ops() {
            match op {
                SettingsOp::Set { key, value } => {
                    values.insert(key, value);
                }
                SettingsOp::Delete { key } => {
                    values.remove(&key);
                }
            }
        }
        Ok(())
    }
}
