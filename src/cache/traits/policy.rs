//! Prefetch policy trait
//!
//! A policy looks at an artifact that was just produced and names further
//! artifacts worth computing ahead of time.

use crate::cache::index::CacheIndex;

pub trait PrefetchPolicy: Send + Sync {
    /// Candidates to prefetch after `accessed` was produced with `content`,
    /// highest priority first
    fn apply(&self, accessed: &CacheIndex, content: &[u8]) -> Vec<CacheIndex>;
}

impl<F> PrefetchPolicy for F
where
    F: Fn(&CacheIndex, &[u8]) -> Vec<CacheIndex> + Send + Sync,
{
    fn apply(&self, accessed: &CacheIndex, content: &[u8]) -> Vec<CacheIndex> {
        self(accessed, content)
    }
}
