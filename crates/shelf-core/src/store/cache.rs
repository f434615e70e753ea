//! Key-value cache backing the state store.
//!
//! The kiosk persists three JSON records between sessions. The cache is a
//! dumb string store; decoding (and dropping corrupt values) is the store's
//! job.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// The persisted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    ActiveJob,
    Queue,
    ShelfState,
}

impl CacheKey {
    pub const ALL: [CacheKey; 3] = [CacheKey::ActiveJob, CacheKey::Queue, CacheKey::ShelfState];

    /// Key name on disk, shared with the browser kiosk's localStorage.
    pub fn as_str(self) -> &'static str {
        match self {
            CacheKey::ActiveJob => "activeJob",
            CacheKey::Queue => "shelfQueue",
            CacheKey::ShelfState => "globalShelfState",
        }
    }
}

pub trait KvCache: Send {
    /// Returns `Ok(None)` when the key is absent.
    fn get(&self, key: CacheKey) -> Result<Option<String>>;
    fn set(&mut self, key: CacheKey, value: &str) -> Result<()>;
    /// Removing an absent key is not an error.
    fn remove(&mut self, key: CacheKey) -> Result<()>;
}

/// One `<key>.json` file per record under a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }
}

impl KvCache for FileCache {
    fn get(&self, key: CacheKey) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("Failed to read cache entry {}", path.display()))
    }

    fn set(&mut self, key: CacheKey, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory {}", self.dir.display()))?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, value)
            .with_context(|| format!("Failed to write cache entry {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;
        Ok(())
    }

    fn remove(&mut self, key: CacheKey) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove cache entry {}", path.display())),
        }
    }
}

/// In-process cache. Nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: HashMap<CacheKey, String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvCache for MemoryCache {
    fn get(&self, key: CacheKey) -> Result<Option<String>> {
        Ok(self.entries.get(&key).cloned())
    }

    fn set(&mut self, key: CacheKey, value: &str) -> Result<()> {
        self.entries.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: CacheKey) -> Result<()> {
        self.entries.remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_file_cache_set_get_remove() {
        let dir = tempdir().unwrap();
        let mut cache = FileCache::new(dir.path().join("cache"));

        assert_eq!(cache.get(CacheKey::Queue).unwrap(), None);

        cache.set(CacheKey::Queue, "[]").unwrap();
        assert_eq!(cache.get(CacheKey::Queue).unwrap().as_deref(), Some("[]"));
        assert!(cache.path_for(CacheKey::Queue).ends_with("shelfQueue.json"));

        cache.remove(CacheKey::Queue).unwrap();
        cache.remove(CacheKey::Queue).unwrap();
        assert_eq!(cache.get(CacheKey::Queue).unwrap(), None);
    }

    #[test]
    fn test_memory_cache_keys_are_independent() {
        let mut cache = MemoryCache::new();
        cache.set(CacheKey::ActiveJob, "{}").unwrap();
        assert_eq!(cache.get(CacheKey::ShelfState).unwrap(), None);
        assert_eq!(cache.get(CacheKey::ActiveJob).unwrap().as_deref(), Some("{}"));
    }
}
