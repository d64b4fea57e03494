//! In-memory reference store with per-category quotas
//!
//! Entries of each category are ordered by a logical access clock; when a
//! store pushes a category over its quota, the least recently used entries of
//! that category are evicted until both bounds hold again.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::cache::error::CacheError;
use crate::cache::index::{CacheProperty, Category};
use crate::cache::traits::CacheStore;

/// Per-category capacity bound; zero disables a bound
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quota {
    pub max_count: u32,
    pub max_bytes: u64,
}

impl Quota {
    fn allows(&self, count: usize, bytes: u64) -> bool {
        (self.max_count == 0 || count <= self.max_count as usize)
            && (self.max_bytes == 0 || bytes <= self.max_bytes)
    }
}

#[derive(Debug)]
struct StoredEntry {
    content: Vec<u8>,
    access_time: u64,
}

/// Artifacts of one category with LRU bookkeeping
#[derive(Debug, Default)]
struct CategoryEntries {
    entries: HashMap<String, StoredEntry>,
    /// access_time -> key, oldest first
    access_order: BTreeMap<u64, String>,
    total_bytes: u64,
    quota: Quota,
}

impl CategoryEntries {
    fn touch(&mut self, key: &str, now: u64) {
        if let Some(entry) = self.entries.get_mut(key) {
            self.access_order.remove(&entry.access_time);
            entry.access_time = now;
            self.access_order.insert(now, key.to_string());
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.access_order.remove(&entry.access_time);
                self.total_bytes -= entry.content.len() as u64;
                true
            }
            None => false,
        }
    }

    fn insert(&mut self, key: &str, content: &[u8], now: u64) {
        self.remove(key);
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                content: content.to_vec(),
                access_time: now,
            },
        );
        self.access_order.insert(now, key.to_string());
        self.total_bytes += content.len() as u64;
    }

    /// Evict oldest entries until the quota holds
    fn enforce_quota(&mut self) -> usize {
        let mut evicted = 0;
        while !self.quota.allows(self.entries.len(), self.total_bytes) {
            let Some((_, oldest)) = self.access_order.pop_first() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&oldest) {
                self.total_bytes -= entry.content.len() as u64;
                evicted += 1;
            }
        }
        evicted
    }
}

/// Reference [`CacheStore`] keeping every artifact in process memory
///
/// Properties live in the same struct, so they only survive as long as the
/// store itself; hosts needing persistence across restarts plug their own
/// store implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    categories: HashMap<Category, CategoryEntries>,
    properties: HashMap<CacheProperty, String>,
    logical_time: u64,
    evictions: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&mut self) -> u64 {
        self.logical_time += 1;
        self.logical_time
    }

    /// Number of artifacts currently stored for `category`
    pub fn len(&self, category: Category) -> usize {
        self.categories
            .get(&category)
            .map(|c| c.entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.values().all(|c| c.entries.is_empty())
    }

    /// Bytes currently stored for `category`
    pub fn total_bytes(&self, category: Category) -> u64 {
        self.categories
            .get(&category)
            .map(|c| c.total_bytes)
            .unwrap_or(0)
    }

    pub fn quota(&self, category: Category) -> Quota {
        self.categories
            .get(&category)
            .map(|c| c.quota)
            .unwrap_or_default()
    }

    /// Total entries evicted to honour quotas since creation
    pub fn evictions(&self) -> u64 {
        self.evictions
    }
}

impl CacheStore for MemoryStore {
    fn access(&mut self, category: Category, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = self.tick();
        let Some(entries) = self.categories.get_mut(&category) else {
            return Ok(None);
        };
        entries.touch(key, now);
        Ok(entries.entries.get(key).map(|e| e.content.clone()))
    }

    fn is_cached(&mut self, category: Category, key: &str) -> Result<bool, CacheError> {
        Ok(self
            .categories
            .get(&category)
            .is_some_and(|c| c.entries.contains_key(key)))
    }

    fn store(&mut self, category: Category, key: &str, content: &[u8]) -> Result<(), CacheError> {
        let now = self.tick();
        let entries = self.categories.entry(category).or_default();

        let max_bytes = entries.quota.max_bytes;
        if max_bytes != 0 && content.len() as u64 > max_bytes {
            debug!(
                "not storing {}:{} ({} bytes exceeds the {} byte quota)",
                category,
                key,
                content.len(),
                max_bytes
            );
            entries.remove(key);
            return Ok(());
        }

        entries.insert(key, content, now);
        let evicted = entries.enforce_quota();
        if evicted > 0 {
            debug!("evicted {} entries from {}", evicted, category);
            self.evictions += evicted as u64;
        }
        Ok(())
    }

    fn invalidate(&mut self, category: Category, key: &str) -> Result<(), CacheError> {
        if let Some(entries) = self.categories.get_mut(&category) {
            entries.remove(key);
        }
        Ok(())
    }

    fn set_quota(
        &mut self,
        category: Category,
        max_count: u32,
        max_bytes: u64,
    ) -> Result<(), CacheError> {
        let entries = self.categories.entry(category).or_default();
        entries.quota = Quota {
            max_count,
            max_bytes,
        };
        let evicted = entries.enforce_quota();
        self.evictions += evicted as u64;
        Ok(())
    }

    fn set_property(&mut self, property: CacheProperty, value: &str) -> Result<(), CacheError> {
        self.properties.insert(property, value.to_string());
        Ok(())
    }

    fn lookup_property(&mut self, property: CacheProperty) -> Result<Option<String>, CacheError> {
        Ok(self.properties.get(&property).cloned())
    }

    fn clear(&mut self) -> Result<(), CacheError> {
        for entries in self.categories.values_mut() {
            entries.entries.clear();
            entries.access_order.clear();
            entries.total_bytes = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGES: Category = Category::DECODED_IMAGE;

    #[test]
    fn test_store_and_access() {
        let mut store = MemoryStore::new();
        assert_eq!(store.access(IMAGES, "a").unwrap(), None);

        store.store(IMAGES, "a", b"content-a").unwrap();
        assert_eq!(store.access(IMAGES, "a").unwrap(), Some(b"content-a".to_vec()));
        assert!(store.is_cached(IMAGES, "a").unwrap());
        assert!(!store.is_cached(Category::SERIES_INFORMATION, "a").unwrap());

        store.store(IMAGES, "a", b"v2").unwrap();
        assert_eq!(store.access(IMAGES, "a").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(store.total_bytes(IMAGES), 2);
    }

    #[test]
    fn test_count_quota_evicts_least_recently_used() {
        let mut store = MemoryStore::new();
        store.set_quota(IMAGES, 2, 0).unwrap();

        store.store(IMAGES, "a", b"1").unwrap();
        store.store(IMAGES, "b", b"2").unwrap();
        // refresh "a" so that "b" becomes the oldest
        store.access(IMAGES, "a").unwrap();
        store.store(IMAGES, "c", b"3").unwrap();

        assert!(store.is_cached(IMAGES, "a").unwrap());
        assert!(!store.is_cached(IMAGES, "b").unwrap());
        assert!(store.is_cached(IMAGES, "c").unwrap());
        assert_eq!(store.evictions(), 1);
    }

    #[test]
    fn test_byte_quota() {
        let mut store = MemoryStore::new();
        store.set_quota(IMAGES, 0, 10).unwrap();

        store.store(IMAGES, "a", &[0u8; 6]).unwrap();
        store.store(IMAGES, "b", &[0u8; 6]).unwrap();
        assert!(!store.is_cached(IMAGES, "a").unwrap());
        assert!(store.is_cached(IMAGES, "b").unwrap());
        assert_eq!(store.total_bytes(IMAGES), 6);

        // larger than the whole quota: refused, existing entries untouched
        store.store(IMAGES, "huge", &[0u8; 11]).unwrap();
        assert!(!store.is_cached(IMAGES, "huge").unwrap());
        assert!(store.is_cached(IMAGES, "b").unwrap());
    }

    #[test]
    fn test_quotas_are_per_category() {
        let mut store = MemoryStore::new();
        store.set_quota(Category::SERIES_INFORMATION, 1, 0).unwrap();

        store.store(Category::SERIES_INFORMATION, "s1", b"x").unwrap();
        store.store(Category::SERIES_INFORMATION, "s2", b"x").unwrap();
        store.store(IMAGES, "i1", b"x").unwrap();
        store.store(IMAGES, "i2", b"x").unwrap();

        assert_eq!(store.len(Category::SERIES_INFORMATION), 1);
        assert_eq!(store.len(IMAGES), 2);
    }

    #[test]
    fn test_shrinking_quota_evicts_immediately() {
        let mut store = MemoryStore::new();
        for key in ["a", "b", "c"] {
            store.store(IMAGES, key, b"x").unwrap();
        }
        store.set_quota(IMAGES, 1, 0).unwrap();
        assert_eq!(store.len(IMAGES), 1);
        assert!(store.is_cached(IMAGES, "c").unwrap());
    }

    #[test]
    fn test_clear_keeps_properties_and_quotas() {
        let mut store = MemoryStore::new();
        store.set_quota(IMAGES, 5, 0).unwrap();
        store.set_property(CacheProperty::ViewerVersion, "1.2.0").unwrap();
        store.store(IMAGES, "a", b"x").unwrap();

        store.clear().unwrap();

        assert!(store.is_empty());
        assert_eq!(store.total_bytes(IMAGES), 0);
        assert_eq!(store.quota(IMAGES).max_count, 5);
        assert_eq!(
            store.lookup_property(CacheProperty::ViewerVersion).unwrap(),
            Some("1.2.0".to_string())
        );
        assert_eq!(store.lookup_property(CacheProperty::HostVersion).unwrap(), None);
    }

    #[test]
    fn test_invalidate_missing_key_is_ok() {
        let mut store = MemoryStore::new();
        store.invalidate(IMAGES, "nothing").unwrap();
        store.store(IMAGES, "a", b"x").unwrap();
        store.invalidate(IMAGES, "a").unwrap();
        assert!(!store.is_cached(IMAGES, "a").unwrap());
        assert_eq!(store.total_bytes(IMAGES), 0);
    }
}
