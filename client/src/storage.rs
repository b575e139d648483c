//! Key-value persistence for session data and cookies.
//!
//! Everything persisted by the client goes through [`KeyValueStore`], so the
//! session layer never cares whether it is backed by memory or by a file.

use jiff::{Span, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::time::TimeSource;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O failed for {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Stored value is not valid JSON")]
    Serialization(#[from] serde_json::Error),
}

/// A string key-value store.
///
/// `set_many` and `remove_many` apply all of their changes at once: no
/// caller can observe a state where only some of the keys were written.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError>;

    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError>;

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.set_many(&[(key, value)])
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.remove_many(&[key])
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        (**self).set_many(entries)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        (**self).remove_many(keys)
    }
}

/// In-process store. Used when no storage path is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        let mut map = self.entries.lock();
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut map = self.entries.lock();
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

/// Durable store: an in-memory map written through to a JSON file.
///
/// A write that fails to reach the disk leaves the in-memory view unchanged.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                BTreeMap::new()
            }
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        tracing::debug!(
            path = %path.display(),
            keys = entries.len(),
            "opened file store"
        );
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(
        &self,
        entries: &BTreeMap<String, String>,
    ) -> Result<(), StorageError> {
        let contents = serde_json::to_string_pretty(entries)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| {
                StorageError::Io {
                    path: parent.to_path_buf(),
                    source,
                }
            })?;
        }
        // Write to a sibling file and rename so readers never see half a file.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, contents).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        let mut map = self.entries.lock();
        let mut next = map.clone();
        for (key, value) in entries {
            next.insert((*key).to_string(), value.clone());
        }
        self.flush(&next)?;
        *map = next;
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut map = self.entries.lock();
        let mut next = map.clone();
        for key in keys {
            next.remove(*key);
        }
        self.flush(&next)?;
        *map = next;
        Ok(())
    }
}

/// How long cookies written by the client live.
pub fn one_year() -> Span {
    Span::new().hours(365 * 24)
}

#[derive(Serialize, Deserialize)]
struct Cookie {
    value: String,
    expires_at: Timestamp,
}

/// Cookie storage with per-entry expiry, layered over any store.
#[derive(Clone)]
pub struct CookieJar {
    store: Arc<dyn KeyValueStore>,
    time_source: TimeSource,
    max_age: Span,
}

impl CookieJar {
    pub fn new(store: Arc<dyn KeyValueStore>, time_source: TimeSource) -> Self {
        Self {
            store,
            time_source,
            max_age: one_year(),
        }
    }

    pub fn with_max_age(mut self, max_age: Span) -> Self {
        self.max_age = max_age;
        self
    }

    fn storage_key(name: &str) -> String {
        format!("cookie:{name}")
    }

    /// Read a cookie, dropping it if it has expired.
    pub fn get(&self, name: &str) -> Result<Option<String>, StorageError> {
        let key = Self::storage_key(name);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };
        let cookie: Cookie = match serde_json::from_str(&raw) {
            Ok(cookie) => cookie,
            Err(e) => {
                tracing::warn!(
                    cookie = name,
                    "discarding malformed cookie: {e}"
                );
                self.store.remove(&key)?;
                return Ok(None);
            }
        };
        if cookie.expires_at <= self.time_source.now() {
            tracing::debug!(cookie = name, "cookie expired");
            self.store.remove(&key)?;
            return Ok(None);
        }
        Ok(Some(cookie.value))
    }

    /// Write a cookie that expires `max_age` from now.
    pub fn set(&self, name: &str, value: String) -> Result<(), StorageError> {
        let expires_at = match self.time_source.now().checked_add(self.max_age)
        {
            Ok(expires_at) => expires_at,
            Err(e) => {
                tracing::warn!(cookie = name, "cookie expiry overflow: {e}");
                Timestamp::MAX
            }
        };
        let cookie = Cookie { value, expires_at };
        self.store
            .set(&Self::storage_key(name), serde_json::to_string(&cookie)?)
    }

    pub fn remove(&self, name: &str) -> Result<(), StorageError> {
        self.store.remove(&Self::storage_key(name))
    }
}
