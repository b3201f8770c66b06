/*
 * cache/file.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Persistent cache tier.
//!
//! Layout: `<root>/<hh>/<hash>.json`, where `<hash>` is the lower-case hex
//! SHA-256 of the identity key and `<hh>` its first two characters.

use super::CacheEntry;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";

/// Hash-sharded directory of artifact files.
#[derive(Debug, Clone)]
pub struct FileTier {
    root: PathBuf,
}

impl FileTier {
    /// Point a tier at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that stores the entry for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let hash = hash_key(key);
        self.root
            .join(&hash[..2])
            .join(format!("{}.{}", hash, EXTENSION))
    }

    /// Read an entry. A missing file is `Ok(None)`; other failures propagate.
    pub fn read(&self, key: &str) -> io::Result<Option<CacheEntry>> {
        let path = self.path_for(key);
        let value = match fs::read_to_string(&path) {
            Ok(value) => value,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let timestamp = fs::metadata(&path)?.modified()?;
        Ok(Some(CacheEntry::new(value, timestamp)))
    }

    /// Write an entry, creating the shard directory if needed.
    pub fn write(&self, key: &str, value: &str) -> io::Result<PathBuf> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&path, value)?;
        Ok(path)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    /// Modification time of the entry's file, if it exists.
    pub fn modified(&self, key: &str) -> Option<std::time::SystemTime> {
        fs::metadata(self.path_for(key))
            .and_then(|m| m.modified())
            .ok()
    }

    /// Remove an entry. Returns whether a file was removed.
    pub fn remove(&self, key: &str) -> io::Result<bool> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Empty the whole directory subtree. The root directory itself is kept.
    pub fn clear(&self) -> io::Result<()> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

/// Fixed-width hex digest of an identity key.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_fixed_width_hex() {
        let short = hash_key("a");
        let long = hash_key(&"x".repeat(4096));
        assert_eq!(short.len(), 64);
        assert_eq!(long.len(), 64);
        assert!(short.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(hash_key("a"), short);
        assert_ne!(hash_key("b"), short);
    }

    #[test]
    fn test_path_is_sharded() {
        let tier = FileTier::new("/cache");
        let path = tier.path_for("templates/page.inky");
        let hash = hash_key("templates/page.inky");
        assert_eq!(
            path,
            PathBuf::from("/cache").join(&hash[..2]).join(format!("{}.json", hash))
        );
    }

    #[test]
    fn test_read_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let tier = FileTier::new(dir.path());
        assert!(tier.read("nope").unwrap().is_none());
        assert!(!tier.remove("nope").unwrap());
    }

    #[test]
    fn test_write_read_clear() {
        let dir = tempfile::tempdir().unwrap();
        let tier = FileTier::new(dir.path().join("nested"));
        tier.write("k", "v").unwrap();
        assert!(tier.exists("k"));
        assert_eq!(tier.read("k").unwrap().map(|e| e.value), Some("v".to_string()));
        assert!(tier.modified("k").is_some());

        tier.clear().unwrap();
        assert!(!tier.exists("k"));
        assert!(tier.root().is_dir());
        assert_eq!(fs::read_dir(tier.root()).unwrap().count(), 0);
    }

    #[test]
    fn test_clear_missing_root_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        FileTier::new(dir.path().join("absent")).clear().unwrap();
    }
}
