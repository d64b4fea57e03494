//! Lookahead - concurrent cache scheduler with policy-driven prefetch
//!
//! Foreground requests are served from a shared store or produced on the
//! calling thread; every fresh artifact is handed to a prefetch policy whose
//! candidates are computed by per-category worker pools.
//!
//! # Features
//!
//! - **Categories**: one factory, one LIFO prefetch queue and one worker pool each
//! - **Deduplicated prefetch**: a key is pending at most once per category
//! - **Invalidation**: in-flight background results are kept out of the store
//! - **Pluggable store**: in-memory LRU store with per-category quotas included
//! - **Viewer policy**: series and quality-tier anticipation for image viewers

pub mod cache;
pub mod lookahead;
pub mod prelude;

pub use cache::{CacheError, CacheIndex, CacheScheduler, Category};
pub use lookahead::{Lookahead, LookaheadBuilder, SeriesResolver};
