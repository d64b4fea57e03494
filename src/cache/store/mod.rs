//! Backing store implementations and the shared store handle

use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::traits::CacheStore;

pub mod memory;

pub use memory::{MemoryStore, Quota};

/// Store shared by the foreground path and every prefetch worker
///
/// The mutex is the scheduler's store lock: every read and write of the
/// backing store goes through it.
pub type SharedStore = Arc<Mutex<Box<dyn CacheStore>>>;

/// Wrap a store into the shared, lock-guarded handle
pub fn shared(store: impl CacheStore + 'static) -> SharedStore {
    Arc::new(Mutex::new(Box::new(store)))
}
