/*
 * cache/memory.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! In-process cache tier.

use super::CacheEntry;
use std::collections::HashMap;

/// Map from identity key to cached artifact text.
///
/// Entries live until they are deleted or the tier is cleared; nothing is
/// evicted.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: HashMap<String, CacheEntry>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove an entry. Returns whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
