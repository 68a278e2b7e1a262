//! Settings persistence
//!
//! [`LocalStorage`] is a flat key/value store kept as one JSON object on
//! disk. [`TuningStore`] keeps the [`UiTuning`] under its versioned key.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{SettingsError, SettingsResult};
use crate::tuning::{UiTuning, UI_TUNING_KEY};

const APP_DIR: &str = "muralkit";
const STORAGE_FILE: &str = "storage.json";

/// Default storage file in the platform config directory
pub fn default_storage_path() -> SettingsResult<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| SettingsError::ConfigDirectory("no config directory on this platform".into()))?
        .join(APP_DIR);
    Ok(dir.join(STORAGE_FILE))
}

/// JSON-object file of string keys to arbitrary values
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl LocalStorage {
    /// Open the store at `path`.
    ///
    /// A missing file is an empty store; an unreadable or corrupt one is an
    /// error so it is not silently overwritten.
    pub fn open(path: impl Into<PathBuf>) -> SettingsResult<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?;
            match serde_json::from_str::<Value>(&content)? {
                Value::Object(map) => map,
                _ => {
                    return Err(SettingsError::LoadError(format!(
                        "{}: not a JSON object",
                        path.display()
                    )))
                }
            }
        } else {
            Map::new()
        };

        debug!("Opened {} ({} keys)", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    /// Open the store in the platform config directory
    pub fn open_default() -> SettingsResult<Self> {
        Self::open(default_storage_path()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Write the store, creating the parent directory if needed.
    pub fn flush(&self) -> SettingsResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| SettingsError::ConfigDirectory(format!("{}: {}", parent.display(), e)))?;
            }
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", self.path.display(), e)))?;
        Ok(())
    }
}

/// Persisted UI tuning
#[derive(Debug, Clone)]
pub struct TuningStore {
    storage: Option<LocalStorage>,
}

impl TuningStore {
    pub fn new(storage: LocalStorage) -> Self {
        Self {
            storage: Some(storage),
        }
    }

    /// Store backed by the file at `path`.
    ///
    /// If the file cannot be opened the store still works, with defaults
    /// and without persistence.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        match LocalStorage::open(path) {
            Ok(storage) => Self::new(storage),
            Err(e) => {
                warn!("Settings storage unavailable, using defaults: {}", e);
                Self { storage: None }
            }
        }
    }

    pub fn open_default() -> Self {
        match default_storage_path() {
            Ok(path) => Self::open(path),
            Err(e) => {
                warn!("Settings storage unavailable, using defaults: {}", e);
                Self { storage: None }
            }
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.storage.is_some()
    }

    /// Saved tuning, sanitized; defaults when nothing is stored
    pub fn load(&self) -> UiTuning {
        self.storage
            .as_ref()
            .and_then(|s| s.get(UI_TUNING_KEY))
            .map(UiTuning::sanitize)
            .unwrap_or_default()
    }

    pub fn save(&mut self, tuning: &UiTuning) -> SettingsResult<()> {
        let Some(storage) = self.storage.as_mut() else {
            return Err(SettingsError::SaveError("no storage available".into()));
        };
        storage.set(UI_TUNING_KEY, serde_json::to_value(tuning)?);
        storage.flush()?;
        debug!("Saved tuning {:?}", tuning);
        Ok(())
    }

    /// Restore and persist the defaults
    pub fn reset(&mut self) -> SettingsResult<UiTuning> {
        let tuning = UiTuning::default();
        self.save(&tuning)?;
        Ok(tuning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::open(dir.path().join("storage.json")).unwrap();
        assert_eq!(storage.keys().count(), 0);
    }

    #[test]
    fn test_flush_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let mut storage = LocalStorage::open(&path).unwrap();
        storage.set("theme", json!("dark"));
        storage.flush().unwrap();

        let reopened = LocalStorage::open(&path).unwrap();
        assert_eq!(reopened.get("theme"), Some(&json!("dark")));
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "[1,2,3]").unwrap();
        assert!(matches!(
            LocalStorage::open(&path),
            Err(SettingsError::LoadError(_))
        ));

        fs::write(&path, "{broken").unwrap();
        assert!(matches!(
            LocalStorage::open(&path),
            Err(SettingsError::JsonError(_))
        ));
    }

    #[test]
    fn test_tuning_store_without_storage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "not json").unwrap();

        let mut store = TuningStore::open(&path);
        assert!(!store.is_persistent());
        assert_eq!(store.load(), UiTuning::default());
        assert!(store.save(&UiTuning::default()).is_err());
    }
}
