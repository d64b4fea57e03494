//! Extension points of the scheduler
//!
//! Implement [`CacheFactory`] to produce the artifacts of a category,
//! [`CacheStore`] to persist them and [`PrefetchPolicy`] to decide what is
//! worth computing ahead of time.

pub mod factory;
pub mod policy;
pub mod store;

pub use factory::CacheFactory;
pub use policy::PrefetchPolicy;
pub use store::CacheStore;
