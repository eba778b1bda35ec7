//! Storage utilities for Slow Computer apps
//!
//! Handles platform directories, JSON files and the small key/value
//! settings store every app keeps its preferences in.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("File not found: {0}")]
    NotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Get the config directory for Slow Computer apps
pub fn config_dir(app_name: &str) -> PathBuf {
    directories::ProjectDirs::from("co", "slowcomputer", app_name)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the cache directory for Slow Computer apps
pub fn cache_dir(app_name: &str) -> PathBuf {
    directories::ProjectDirs::from("co", "slowcomputer", app_name)
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".cache").join(app_name))
}

/// Read and decode a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_str(&contents)?)
}

/// Encode `value` as pretty JSON and write it to `path`.
///
/// The file is written next to its destination first and renamed into
/// place, so a crash mid-write never leaves a truncated file behind.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let contents = serde_json::to_string_pretty(value)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// A simple string key/value store for preferences.
///
/// Every write is durable before it returns; there is no batching.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Key/value store backed by a single JSON object on disk.
pub struct SettingsFile {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl SettingsFile {
    /// Open the settings file at `path`. A missing or unreadable file
    /// starts out empty; it is created on the first write.
    pub fn open(path: PathBuf) -> Self {
        let values = match read_json::<BTreeMap<String, String>>(&path) {
            Ok(values) => values,
            Err(StorageError::NotFound(_)) => BTreeMap::new(),
            Err(e) => {
                warn!("ignoring unreadable settings file {}: {e}", path.display());
                BTreeMap::new()
            }
        };
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    /// The settings file for `app_name` inside its config directory.
    pub fn for_app(app_name: &str) -> Self {
        Self::open(config_dir(app_name).join("settings.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for SettingsFile {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = lock(&self.values);
        values.insert(key.to_string(), value.to_string());
        write_json(&self.path, &*values)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = lock(&self.values);
        if values.remove(key).is_some() {
            write_json(&self.path, &*values)?;
        }
        Ok(())
    }
}

/// In-memory key/value store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.values).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.values).remove(key);
        Ok(())
    }
}
