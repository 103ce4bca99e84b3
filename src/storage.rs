//! Local Storage Module
//!
//! Persistent key-value entries backing the session (token + user profile).

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info};

/// String key-value store with device-persistent semantics
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every key, attempting all of them before reporting the first failure
    fn multi_remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.remove_item(key) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Serialize `value` as JSON under `key`
pub fn save_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let json =
        serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
    store.set_item(key, &json)
}

/// Load and deserialize the JSON stored under `key`
pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get_item(key)? {
        Some(json) => serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| StorageError::Serialization(e.to_string())),
        None => Ok(None),
    }
}

/// One file per key under a storage directory
pub struct FileStorage {
    storage_path: PathBuf,
}

impl FileStorage {
    pub fn new(storage_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let storage_path = storage_path.into();

        std::fs::create_dir_all(&storage_path).map_err(|e| StorageError::Io(e.to_string()))?;

        debug!("File storage initialized at: {:?}", storage_path);

        Ok(Self { storage_path })
    }

    fn file_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.storage_path.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let file_path = self.file_path(key)?;

        match std::fs::read_to_string(&file_path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let file_path = self.file_path(key)?;
        let tmp_path = file_path.with_extension("json.tmp");

        std::fs::write(&tmp_path, value).map_err(|e| StorageError::Io(e.to_string()))?;
        std::fs::rename(&tmp_path, &file_path).map_err(|e| StorageError::Io(e.to_string()))?;

        debug!("Stored value for key: {}", key);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let file_path = self.file_path(key)?;

        match std::fs::remove_file(&file_path) {
            Ok(()) => {
                info!("Deleted stored data for key: {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }
}

/// In-process store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Io("memory storage lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
}
