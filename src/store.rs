//! small persisted key-value state (the remembered device name)
//!
//! reads and writes never fail the caller: a missing or broken backing file
//! reads as empty and a failed write is only logged.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DEVICE_NAME_KEY: &str = "iot_device_name";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
    }
}

/// json object on disk, rewritten on every set
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    fn read_all(path: &Path) -> BTreeMap<String, String> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(path = %path.display(), "store not readable: {e}");
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), "store is not a json object, ignoring: {e}");
            BTreeMap::new()
        })
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, json)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        Self::read_all(&self.path).remove(key)
    }

    fn set(&self, key: &str, value: &str) {
        let _guard = self.lock.lock();
        let mut values = Self::read_all(&self.path);
        values.insert(key.to_string(), value.to_string());
        if let Err(e) = self.write_all(&values) {
            tracing::warn!(path = %self.path.display(), "failed to persist {key}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get(DEVICE_NAME_KEY), None);
        store.set(DEVICE_NAME_KEY, "greenhouse-pi");
        assert_eq!(store.get(DEVICE_NAME_KEY).as_deref(), Some("greenhouse-pi"));
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("device.json");

        FileStore::new(&path).set(DEVICE_NAME_KEY, "garage");
        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get(DEVICE_NAME_KEY).as_deref(), Some("garage"));

        reopened.set("other", "kept");
        assert_eq!(reopened.get(DEVICE_NAME_KEY).as_deref(), Some("garage"));
        assert_eq!(reopened.get("other").as_deref(), Some("kept"));
    }

    #[test]
    fn corrupt_or_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = FileStore::new(dir.path().join("nope.json"));
        assert_eq!(missing.get(DEVICE_NAME_KEY), None);

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        let store = FileStore::new(&path);
        assert_eq!(store.get(DEVICE_NAME_KEY), None);
        store.set(DEVICE_NAME_KEY, "recovered");
        assert_eq!(store.get(DEVICE_NAME_KEY).as_deref(), Some("recovered"));
    }

    #[test]
    fn unwritable_location_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        // parent is a regular file, so the directory cannot be created
        let store = FileStore::new(blocker.join("device.json"));
        store.set(DEVICE_NAME_KEY, "lost");
        assert_eq!(store.get(DEVICE_NAME_KEY), None);
    }
}
