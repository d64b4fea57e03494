//! Lookahead prelude - convenient imports for users

pub use crate::lookahead::{Lookahead, LookaheadBuilder, SeriesResolver};

pub use crate::cache::config::{SchedulerConfig, ViewerCacheConfig};
pub use crate::cache::error::CacheError;
pub use crate::cache::index::{CacheIndex, CacheProperty, Category};
pub use crate::cache::policy::{ImageKey, QualityTier, ViewerPrefetchPolicy};
pub use crate::cache::scheduler::CacheScheduler;
pub use crate::cache::store::MemoryStore;
pub use crate::cache::worker::{EnqueueOutcome, PrefetchStatsSnapshot};

// Extension points users implement
pub use crate::cache::traits::{CacheFactory, CacheStore, PrefetchPolicy};
