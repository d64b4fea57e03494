//! Cache scheduling system
//!
//! Artifacts are addressed by a [`CacheIndex`](index::CacheIndex), produced by
//! per-category factories, kept in a pluggable store and anticipated by
//! background prefetch workers driven by a policy.

pub mod config;
pub mod error;
pub mod index;
pub mod policy;
pub mod scheduler;
pub mod store;
pub mod traits;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{SchedulerConfig, ViewerCacheConfig};
pub use error::{CacheError, ErrorClass};
pub use index::{CacheIndex, CacheProperty, Category};
pub use scheduler::{CacheScheduler, CategoryScheduler};
