/*
 * cache/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Two-tier cache for compiled artifacts.
//!
//! Reads check the [`MemoryTier`] first and fall back to the optional
//! [`FileTier`]; a hit in the file tier is promoted into memory. Writes go to
//! both tiers. Without a directory the cache is memory-only.
//!
//! Keys are opaque identity strings (usually a resolved template path).
//! Freshness is the caller's business: [`Cache::timestamp`] reports when an
//! entry was written and the caller compares it against its own source.
//!
//! The file tier takes no locks. Two processes writing the same key race and
//! the last writer wins.

mod file;
mod memory;

pub use file::{FileTier, hash_key};
pub use memory::MemoryTier;

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A cached value and the time it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub value: String,
    pub timestamp: SystemTime,
}

impl CacheEntry {
    pub fn new(value: impl Into<String>, timestamp: SystemTime) -> Self {
        Self {
            value: value.into(),
            timestamp,
        }
    }
}

/// Layered artifact cache.
#[derive(Debug, Default)]
pub struct Cache {
    memory: MemoryTier,
    files: Option<FileTier>,
}

impl Cache {
    /// Memory-only cache.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Cache backed by a persistent directory. The directory is created on
    /// first write.
    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            memory: MemoryTier::new(),
            files: Some(FileTier::new(directory)),
        }
    }

    /// Build from an optional directory.
    pub fn new(directory: Option<PathBuf>) -> Self {
        match directory {
            Some(directory) => Self::with_directory(directory),
            None => Self::memory(),
        }
    }

    pub fn directory(&self) -> Option<&Path> {
        self.files.as_ref().map(FileTier::root)
    }

    /// File that holds `key` in the persistent tier.
    pub fn path_for(&self, key: &str) -> Option<PathBuf> {
        self.files.as_ref().map(|files| files.path_for(key))
    }

    /// Look up `key`, promoting a persistent hit into memory.
    pub fn get(&mut self, key: &str) -> io::Result<Option<String>> {
        if let Some(entry) = self.memory.get(key) {
            tracing::trace!(key = %key, "cache hit (memory)");
            return Ok(Some(entry.value.clone()));
        }

        let Some(files) = &self.files else {
            return Ok(None);
        };
        match files.read(key)? {
            Some(entry) => {
                tracing::debug!(key = %key, "cache hit (file), promoting");
                let value = entry.value.clone();
                self.memory.insert(key, entry);
                Ok(Some(value))
            }
            None => {
                tracing::trace!(key = %key, "cache miss");
                Ok(None)
            }
        }
    }

    /// Store `value` under `key` in every tier.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> io::Result<()> {
        let value = value.into();
        let mut timestamp = SystemTime::now();
        if let Some(files) = &self.files {
            let path = files.write(key, &value)?;
            tracing::debug!(key = %key, path = %path.display(), "cache write");
            if let Some(modified) = files.modified(key) {
                timestamp = modified;
            }
        }
        self.memory.insert(key, CacheEntry::new(value, timestamp));
        Ok(())
    }

    pub fn has(&self, key: &str) -> bool {
        self.memory.contains(key)
            || self.files.as_ref().is_some_and(|files| files.exists(key))
    }

    /// When the entry for `key` was written, if it exists.
    pub fn timestamp(&self, key: &str) -> Option<SystemTime> {
        match self.memory.get(key) {
            Some(entry) => Some(entry.timestamp),
            None => self.files.as_ref().and_then(|files| files.modified(key)),
        }
    }

    /// Remove `key` from both tiers. Returns whether either tier held it.
    pub fn delete(&mut self, key: &str) -> io::Result<bool> {
        let in_memory = self.memory.remove(key);
        let on_disk = match &self.files {
            Some(files) => files.remove(key)?,
            None => false,
        };
        tracing::debug!(key = %key, removed = in_memory || on_disk, "cache delete");
        Ok(in_memory || on_disk)
    }

    /// Empty both tiers, including the persistent directory subtree.
    pub fn clear(&mut self) -> io::Result<bool> {
        self.memory.clear();
        if let Some(files) = &self.files {
            files.clear()?;
            tracing::debug!(directory = %files.root().display(), "cache cleared");
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_memory_only_roundtrip() {
        let mut cache = Cache::memory();
        assert!(cache.directory().is_none());
        assert!(!cache.has("k1"));
        assert_eq!(cache.get("k1").unwrap(), None);

        cache.set("k1", "v1").unwrap();
        assert!(cache.has("k1"));
        assert_eq!(cache.get("k1").unwrap(), Some("v1".to_string()));
        assert!(cache.timestamp("k1").is_some());

        assert!(cache.delete("k1").unwrap());
        assert!(!cache.has("k1"));
        assert!(!cache.delete("k1").unwrap());
        assert!(cache.timestamp("k1").is_none());
    }

    #[test]
    fn test_persistent_entry_is_sharded_and_shared() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = Cache::with_directory(dir.path());
        cache.set("k1", "v1").unwrap();

        let hash = hash_key("k1");
        let shard = dir.path().join(&hash[..2]);
        assert!(shard.is_dir());
        assert_eq!(hash[..2].len(), 2);
        assert!(shard.join(format!("{}.json", hash)).is_file());
        assert_eq!(cache.path_for("k1"), Some(shard.join(format!("{}.json", hash))));

        let mut fresh = Cache::with_directory(dir.path());
        assert!(fresh.has("k1"));
        assert_eq!(fresh.get("k1").unwrap(), Some("v1".to_string()));
    }

    #[test]
    fn test_file_hit_is_promoted() {
        let dir = tempfile::tempdir().unwrap();
        Cache::with_directory(dir.path()).set("k", "v").unwrap();

        let mut cache = Cache::with_directory(dir.path());
        assert_eq!(cache.get("k").unwrap(), Some("v".to_string()));

        // Remove the file behind the cache's back; memory still answers.
        std::fs::remove_file(cache.path_for("k").unwrap()).unwrap();
        assert_eq!(cache.get("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_delete_removes_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = Cache::with_directory(dir.path());
        cache.set("k", "v").unwrap();
        assert!(cache.delete("k").unwrap());
        assert!(!cache.has("k"));
        assert_eq!(Cache::with_directory(dir.path()).get("k").unwrap(), None);
    }

    #[test]
    fn test_clear_empties_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = Cache::with_directory(dir.path());
        let keys = ["a", "b", "templates/c.inky"];
        for key in keys {
            cache.set(key, key.to_uppercase()).unwrap();
        }
        assert!(cache.clear().unwrap());
        for key in keys {
            assert!(!cache.has(key), "{} survived clear", key);
        }
        assert!(dir.path().is_dir());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_timestamp_falls_back_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = Cache::with_directory(dir.path());
        writer.set("k", "v").unwrap();

        let reader = Cache::with_directory(dir.path());
        assert_eq!(reader.timestamp("k"), writer.timestamp("k"));
    }

    #[test]
    fn test_set_fails_when_directory_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let mut cache = Cache::with_directory(&blocker);
        assert!(cache.set("k", "v").is_err());
    }
}
