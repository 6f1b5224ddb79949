//! Abstract settings persistence for the Places Monitor.
//!
//! The monitor persists a handful of keys (monitored regions, regions the user
//! is within, mode, requested authorization level, started flag). Backends
//! implement this trait so the coordinator never depends on where they live:
//! - In-memory backend for tests and embedded use
//! - JSON-file backend for durable storage

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during settings operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    IoError(String),
}

/// A single mutation inside a [`SettingsBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsOp {
    Set { key: String, value: Value },
    Delete { key: String },
}

/// An ordered group of mutations applied together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsBatch {
    ops: Vec<SettingsOp>,
}

impl SettingsBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a set; returns `self` for chaining.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.ops.push(SettingsOp::Set {
            key: key.into(),
            value,
        });
        self
    }

    /// Queue a delete; returns `self` for chaining.
    #[must_use]
    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.ops.push(SettingsOp::Delete { key: key.into() });
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SettingsOp> {
        self.ops.iter()
    }

    #[must_use]
    pub fn into_ops(self) -> Vec<SettingsOp> {
        self.ops
    }
}

/// Key/value settings persistence.
///
/// # Safety Considerations
/// - Implementations must be safe to share across threads
/// - `apply` should be all-or-nothing where the backend allows it
pub trait SettingsStore: Send + Sync {
    /// Read a key. Missing keys are `Ok(None)`.
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Write a key, replacing any previous value.
    fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Remove a key. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Apply a batch of mutations.
    ///
    /// The default applies operations one at a time and is therefore not
    /// atomic; backends that can do better override it.
    fn apply(&self, batch: SettingsBatch) -> Result<(), StorageError> {
        for op in batch.into_ops() {
            match op {
                SettingsOp::Set { key, value } => self.set(&key, value)?,
                SettingsOp::Delete { key } => self.delete(&key)?,
            }
        }
        Ok(())
    }
}
