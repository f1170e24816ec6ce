//! Key-value cache for fetched datasets.
//!
//! Fetching the repository inventory and every maintainer manifest of an
//! organization is slow, so each dataset is stored under a key after the
//! first successful fetch. A present entry short-circuits the fetch; `force`
//! invalidates the entry first. [`JsonFileCache`] keeps one pretty-printed
//! JSON file per key (`cache-<key>.json`), [`MemoryCache`] is for tests.

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache entry {key} is not valid JSON for its dataset: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;
    fn put(&self, key: &str, value: &Value) -> Result<(), CacheError>;
    /// Removing a missing entry is not an error.
    fn invalidate(&self, key: &str) -> Result<(), CacheError>;
}

/// One JSON file per key inside a directory.
pub struct JsonFileCache {
    dir: PathBuf,
}

impl JsonFileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("cache-{key}.json"))
    }

    fn io_error(path: &Path, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Cache for JsonFileCache {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Cache miss");
                return Ok(None);
            }
            Err(e) => return Err(Self::io_error(&path, e)),
        };
        let value = serde_json::from_str(&content).map_err(|source| CacheError::Json {
            key: key.to_string(),
            source,
        })?;
        debug!(path = %path.display(), "Cache hit");
        Ok(Some(value))
    }

    fn put(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;
        let path = self.path_for(key);
        let content = serde_json::to_string_pretty(value).map_err(|source| CacheError::Json {
            key: key.to_string(),
            source,
        })?;
        fs::write(&path, content).map_err(|e| Self::io_error(&path, e))?;
        info!(path = %path.display(), "Wrote cache file");
        Ok(())
    }

    fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "Removed cache file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(self.entries().get(key).cloned())
    }

    fn put(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        self.entries().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Return the dataset stored under `key`, or run `fetch` and store its result.
///
/// With `force` the entry is invalidated before looking it up.
pub async fn cached<T, E, F, Fut>(
    cache: &dyn Cache,
    key: &str,
    force: bool,
    fetch: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    E: From<CacheError>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if force {
        cache.invalidate(key)?;
    }
    if let Some(value) = cache.get(key)? {
        let data = serde_json::from_value(value).map_err(|source| CacheError::Json {
            key: key.to_string(),
            source,
        })?;
        info!(key, "Using cached dataset");
        return Ok(data);
    }

    let data = fetch().await?;
    let value = serde_json::to_value(&data).map_err(|source| CacheError::Json {
        key: key.to_string(),
        source,
    })?;
    cache.put(key, &value)?;
    Ok(data)
}
