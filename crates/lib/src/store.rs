//! Local key/value store for the credential slot and mock-mode upload markers.
//!
//! Presence of a key is what matters; values are only kept for display. The file-backed store
//! keeps a JSON object on disk (e.g. `~/.handset/storage.json`) and rewrites it on every change.

use crate::types::UploadKind;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Slot holding the API key.
pub const API_KEY: &str = "api_key";
/// Marker written when the CSV data source was set by URL in mock mode.
pub const CSV_URL: &str = "csv_url";

/// Marker written by a mock-mode upload of the given kind (`file_csv`, `file_privacy`, `file_terms`).
pub fn upload_key(kind: UploadKind) -> String {
    format!("file_{}", kind.as_str())
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store encode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// String key/value store shared by the gateway client, session and setup flow.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// True when an API key is stored.
pub fn credential_exists(store: &dyn KeyValueStore) -> bool {
    store.contains(API_KEY)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// In-memory store (tests, or sessions that should not touch disk).
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.inner).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        lock(&self.inner).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.inner).remove(key);
        Ok(())
    }
}

fn malformed_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bad");
    PathBuf::from(name)
}

/// JSON-file store. Entries are loaded once on open and written back after each change.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl FileStore {
    /// Open the store at `path`. A missing or unreadable file starts empty; a malformed one is
    /// moved to `<path>.bad` first so the next write cannot clobber it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(s) => match serde_json::from_str::<Map<String, Value>>(&s) {
                Ok(m) => m,
                Err(e) => {
                    let aside = malformed_path(&path);
                    match std::fs::rename(&path, &aside) {
                        Ok(()) => log::error!(
                            "malformed store {} ({}); moved to {}",
                            path.display(),
                            e,
                            aside.display()
                        ),
                        Err(re) => log::error!(
                            "malformed store {} ({}); could not move it aside: {}",
                            path.display(),
                            e,
                            re
                        ),
                    }
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                log::warn!("cannot read store {}: {}", path.display(), e);
                Map::new()
            }
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let s = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, s).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries)
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut g = lock(&self.entries);
        g.insert(key.to_string(), Value::String(value.to_string()));
        self.persist(&g)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut g = lock(&self.entries);
        if g.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("handset-store-test-{}", uuid::Uuid::new_v4()))
            .join("storage.json")
    }

    #[test]
    fn memory_store_set_get_remove() {
        let s = MemoryStore::new();
        assert!(!credential_exists(&s));
        s.set(API_KEY, "k-123").unwrap();
        assert_eq!(s.get(API_KEY).as_deref(), Some("k-123"));
        assert!(credential_exists(&s));
        s.remove(API_KEY).unwrap();
        assert!(!credential_exists(&s));
    }

    #[test]
    fn upload_keys_are_kind_scoped() {
        assert_eq!(upload_key(UploadKind::Csv), "file_csv");
        assert_eq!(upload_key(UploadKind::Privacy), "file_privacy");
        assert_eq!(upload_key(UploadKind::Terms), "file_terms");
    }

    #[test]
    fn file_store_survives_reopen() {
        let path = temp_store_path();
        {
            let s = FileStore::open(&path);
            s.set(API_KEY, "secret").unwrap();
            s.set(&upload_key(UploadKind::Terms), "terms.pdf").unwrap();
            s.remove(&upload_key(UploadKind::Terms)).unwrap();
        }
        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get(API_KEY).as_deref(), Some("secret"));
        assert!(!reopened.contains("file_terms"));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn malformed_file_is_kept_aside_and_store_starts_empty() {
        let path = temp_store_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        let s = FileStore::open(&path);
        assert!(s.get(API_KEY).is_none());

        s.set(API_KEY, "k").unwrap();
        let aside = path.parent().unwrap().join("storage.json.bad");
        assert_eq!(std::fs::read_to_string(&aside).unwrap(), "not json");
        assert_eq!(FileStore::open(&path).get(API_KEY).as_deref(), Some("k"));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
