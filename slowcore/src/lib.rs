//! slowcore - shared library for slow computer applications

pub mod storage;

pub use storage::{KeyValueStore, MemoryStore, SettingsFile, StorageError};
