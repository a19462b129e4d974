//! In-process cache tier.

use dashmap::DashMap;
use std::sync::Arc;

use super::CacheEntry;

/// Concurrent map of whole entries. A write replaces the previous entry for
/// the key; the last writer wins.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: DashMap<String, Arc<CacheEntry>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn insert(&self, entry: CacheEntry) {
        self.entries.insert(entry.key.clone(), Arc::new(entry));
    }

    pub fn remove(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
