//! Persistent keyed storage consumed by the scheduler
//!
//! The scheduler serializes every call through its store lock, hence the
//! `&mut self` receivers. Quota bookkeeping and eviction are entirely the
//! store's business; the scheduler never deletes artifacts itself except
//! through [`CacheStore::invalidate`] and [`CacheStore::clear`].

use crate::cache::error::CacheError;
use crate::cache::index::{CacheProperty, Category};

pub trait CacheStore: Send {
    /// Fetch the content stored for `(category, key)`, refreshing its recency
    fn access(&mut self, category: Category, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Whether `(category, key)` is currently stored, without touching recency
    fn is_cached(&mut self, category: Category, key: &str) -> Result<bool, CacheError>;

    /// Store `content`, overwriting any previous value for the same key
    fn store(&mut self, category: Category, key: &str, content: &[u8]) -> Result<(), CacheError>;

    /// Remove `(category, key)`; removing a missing key is not an error
    fn invalidate(&mut self, category: Category, key: &str) -> Result<(), CacheError>;

    /// Bound the category to `max_count` items and `max_bytes` bytes; zero
    /// disables the corresponding bound
    fn set_quota(
        &mut self,
        category: Category,
        max_count: u32,
        max_bytes: u64,
    ) -> Result<(), CacheError>;

    fn set_property(&mut self, property: CacheProperty, value: &str) -> Result<(), CacheError>;

    fn lookup_property(&mut self, property: CacheProperty) -> Result<Option<String>, CacheError>;

    /// Remove every stored artifact of every category
    fn clear(&mut self) -> Result<(), CacheError>;
}
