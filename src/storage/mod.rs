//! Settings persistence for the Places Monitor.
//!
//! The trait defines the port the coordinator writes through; the in-memory
//! and JSON-file backends implement it.

mod file;
mod memory;
mod traits;

pub use file::FileSettingsStore;
pub use memory::InMemorySettingsStore;
pub use traits::{SettingsBatch, SettingsOp, SettingsStore, StorageError};
