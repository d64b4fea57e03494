//! Addressing types for cached artifacts
//!
//! A [`CacheIndex`] names one artifact as a `(category, key)` pair. Keys are
//! opaque to the scheduler; only prefetch policies interpret their grammar.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Registered class of cacheable artifact
///
/// Each category owns exactly one factory, one prefetch queue, one worker
/// pool and one quota. The well-known viewer categories are provided as
/// associated constants; hosts may register any other value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Category(pub u32);

impl Category {
    /// Per-series metadata (ordered slice list, geometry)
    pub const SERIES_INFORMATION: Category = Category(1);
    /// Decoded and re-encoded frame of one instance
    pub const DECODED_IMAGE: Category = Category(2);

    /// Raw numeric identifier
    #[inline]
    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Category::SERIES_INFORMATION => write!(f, "series-information"),
            Category::DECODED_IMAGE => write!(f, "decoded-image"),
            Category(other) => write!(f, "category-{}", other),
        }
    }
}

impl From<u32> for Category {
    fn from(value: u32) -> Self {
        Category(value)
    }
}

/// Immutable `(category, key)` pair identifying one artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheIndex {
    category: Category,
    key: String,
}

impl CacheIndex {
    pub fn new(category: Category, key: impl Into<String>) -> Self {
        Self {
            category,
            key: key.into(),
        }
    }

    #[inline]
    pub fn category(&self) -> Category {
        self.category
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Split into owned parts
    pub fn into_parts(self) -> (Category, String) {
        (self.category, self.key)
    }
}

impl fmt::Display for CacheIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.key)
    }
}

/// Persisted string values used to version-stamp the cache
///
/// Properties survive restarts of the host; a mismatch on startup means the
/// stored artifacts were produced by other code and must be flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheProperty {
    /// Version of the host server that produced the cached artifacts
    HostVersion,
    /// Version of the viewer that produced the cached artifacts
    ViewerVersion,
}

impl CacheProperty {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheProperty::HostVersion => "host-version",
            CacheProperty::ViewerVersion => "viewer-version",
        }
    }
}

impl fmt::Display for CacheProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
