//! JSON-file settings backend.
//!
//! The whole key space lives in one JSON object. Every mutation rewrites the
//! document with the write-to-temp-then-rename pattern, so a crash leaves
//! either the old document or the new one, never a torn write.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::traits::{SettingsBatch, SettingsOp, SettingsStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

fn io_err(context: &str, err: &std::io::Error) -> StorageError {
    StorageError::IoError(format!("{context}: {err}"))
}

/// Durable settings store backed by a single JSON document.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    sync_on_write: bool,
    values: RwLock<BTreeMap<String, Value>>,
}

impl FileSettingsStore {
    /// Open (or lazily create) the document at `path`.
    ///
    /// A missing file is treated as an empty store; the file is created on the
    /// first write.
    ///
    /// # Errors
    /// - `IoError` if the file exists but cannot be read
    /// - `SerializationError` if it is not a JSON object
    pub fn open(path: impl AsRef<Path>, sync_on_write: bool) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StorageError::SerializationError(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(io_err("read settings", &e)),
        };

        debug!(path = %path.display(), keys = values.len(), "opened settings store");

        Ok(Self {
            path,
            sync_on_write,
            values: RwLock::new(values),
        })
    }

    /// Location of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_document(&self, values: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_err("create settings dir", &e))?;
            }
        }

        let temp_path = self.path.with_extension(format!("tmp.{}", Uuid::new_v4()));
        let result = self.write_temp(&temp_path, values).and_then(|()| {
            fs::rename(&temp_path, &self.path).map_err(|e| io_err("rename settings", &e))
        });

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    fn write_temp(&self, temp_path: &Path, values: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        let file: File = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)
            .map_err(|e| io_err("create temp settings", &e))?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, values)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        writer.flush().map_err(|e| io_err("flush settings", &e))?;

        if self.sync_on_write {
            writer.get_ref().sync_all().map_err(|e| io_err("fsync settings", &e))?;
        }
        Ok(())
    }

    // Stage on a copy, persist, then publish the copy.
    fn mutate(
        &self,
        context: &'static str,
        f: impl FnOnce(&mut BTreeMap<String, Value>),
    ) -> Result<(), StorageError> {
        let mut values = self.values.write().map_err(|_| lock_err(context))?;
        let mut staged = values.clone();
        f(&mut staged);
        if staged == *values {
            return Ok(());
        }
        self.write_document(&staged)?;
        *values = staged;
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let values = self.values.read().map_err(|_| lock_err("settings.get"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.mutate("settings.set", |values| {
            values.insert(key.to_string(), value);
        })
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.mutate("settings.delete", |values| {
            values.remove(key);
        })
    }

    fn apply(&self, batch: SettingsBatch) -> Result<(), StorageError> {
        self.mutate("settings.apply", |values| {
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
        })
    }
}
