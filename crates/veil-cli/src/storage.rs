//! Settings persisted in a JSON key/value file

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use veil_core::{StorageBackend, StorageError};

/// Flat string map written back to disk on every `set`.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStorage {
    /// Open a store. A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let entries = match fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|e| StorageError::Read {
                key: path.display().to_string(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(StorageError::Read {
                    key: path.display().to_string(),
                    message: e.to_string(),
                })
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    fn flush(&self, key: &str) -> Result<(), StorageError> {
        let write_error = |message: String| StorageError::Write {
            key: key.to_string(),
            message,
        };
        let text = serde_json::to_string_pretty(&self.entries).map_err(|e| write_error(e.to_string()))?;
        fs::write(&self.path, text).map_err(|e| write_error(e.to_string()))
    }
}

impl StorageBackend for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.entries.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        self.entries.insert(key.to_string(), value.to_string());
        self.flush(key)
    }
}
