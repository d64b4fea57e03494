//! Top-level cache scheduler
//!
//! Routes every request to the category it concerns or to the backing store.
//! Three independent locks guard the shared state:
//!
//! - the registration table (a `DashMap`, sharded internally),
//! - the store lock, serializing every access to the backing store,
//! - the re-entrant policy lock, serializing policy swaps and invocations.
//!
//! A foreground [`CacheScheduler::access`] never waits for background work:
//! on a miss it runs the category's factory on the calling thread, stores the
//! result and hands the artifact to the prefetch policy.

use std::cell::RefCell;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{debug, info, warn};
use parking_lot::ReentrantMutex;

use super::category::CategoryScheduler;
use crate::cache::config::SchedulerConfig;
use crate::cache::error::CacheError;
use crate::cache::index::{CacheIndex, CacheProperty, Category};
use crate::cache::store::{self, SharedStore};
use crate::cache::traits::{CacheFactory, CacheStore, PrefetchPolicy};
use crate::cache::worker::{EnqueueOutcome, PrefetchStatsSnapshot};

type PolicySlot = ReentrantMutex<RefCell<Option<Arc<dyn PrefetchPolicy>>>>;

/// Facade coordinating foreground accesses, background prefetch and the
/// backing store
pub struct CacheScheduler {
    config: SchedulerConfig,
    store: SharedStore,
    categories: DashMap<Category, Arc<CategoryScheduler>>,
    policy: PolicySlot,
}

impl CacheScheduler {
    /// Create a scheduler over `store` with default settings
    pub fn new(store: impl CacheStore + 'static) -> Self {
        Self {
            config: SchedulerConfig::default(),
            store: store::shared(store),
            categories: DashMap::new(),
            policy: ReentrantMutex::new(RefCell::new(None)),
        }
    }

    /// Create a scheduler with explicit settings over an already shared store
    pub fn with_config(store: SharedStore, config: SchedulerConfig) -> Result<Self, CacheError> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            categories: DashMap::new(),
            policy: ReentrantMutex::new(RefCell::new(None)),
        })
    }

    /// Install `policy` at construction time
    pub fn with_policy(self, policy: impl PrefetchPolicy + 'static) -> Self {
        self.register_policy(policy);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Register the factory of `category` and start its prefetch workers
    ///
    /// A category can be registered only once.
    pub fn register(
        &self,
        category: Category,
        factory: impl CacheFactory + 'static,
        num_threads: usize,
    ) -> Result<(), CacheError> {
        self.register_shared(category, Arc::new(factory), num_threads)
    }

    /// Same as [`CacheScheduler::register`] for a factory the caller keeps a
    /// handle on
    pub fn register_shared(
        &self,
        category: Category,
        factory: Arc<dyn CacheFactory>,
        num_threads: usize,
    ) -> Result<(), CacheError> {
        match self.categories.entry(category) {
            Entry::Occupied(_) => Err(CacheError::CategoryAlreadyRegistered(category)),
            Entry::Vacant(slot) => {
                let scheduler = CategoryScheduler::new(
                    category,
                    factory,
                    Arc::clone(&self.store),
                    num_threads,
                    &self.config,
                )?;
                slot.insert(Arc::new(scheduler));
                Ok(())
            }
        }
    }

    /// Categories registered so far, in ascending order
    pub fn registered_categories(&self) -> Vec<Category> {
        let mut categories: Vec<Category> = self.categories.iter().map(|e| *e.key()).collect();
        categories.sort();
        categories
    }

    fn category_scheduler(&self, category: Category) -> Result<Arc<CategoryScheduler>, CacheError> {
        self.categories
            .get(&category)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(CacheError::CategoryNotRegistered(category))
    }

    pub fn set_quota(
        &self,
        category: Category,
        max_count: u32,
        max_bytes: u64,
    ) -> Result<(), CacheError> {
        self.store.lock().set_quota(category, max_count, max_bytes)
    }

    /// Content of `(category, key)`, produced synchronously on a miss
    ///
    /// `Ok(None)` means the factory cannot produce this key. Policies only
    /// run after a fresh production, never on a hit.
    pub fn access(&self, category: Category, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let cached = self.store.lock().access(category, key)?;
        if let Some(content) = cached {
            debug!("found {}", key);
            return Ok(Some(content));
        }

        debug!("item not found, creating {}", key);
        let scheduler = self.category_scheduler(category)?;
        let content = match scheduler.call_factory(key) {
            Ok(Some(content)) => content,
            Ok(None) => {
                debug!("factory cannot produce {}", key);
                return Ok(None);
            }
            Err(e @ (CacheError::FactoryFailed { .. } | CacheError::ResourceExhausted(_))) => {
                return Err(e);
            }
            Err(e) => {
                return Err(CacheError::factory_failed(
                    CacheIndex::new(category, key),
                    e.to_string(),
                ));
            }
        };

        self.store.lock().store(category, key, &content)?;
        self.apply_prefetch_policy(category, key, &content);
        Ok(Some(content))
    }

    /// Ask the installed policy for candidates and queue them so that the
    /// highest-priority one is dequeued first
    fn apply_prefetch_policy(&self, category: Category, key: &str, content: &[u8]) {
        let slot = self.policy.lock();
        let policy = slot.borrow().clone();
        let Some(policy) = policy else {
            return;
        };

        let accessed = CacheIndex::new(category, key);
        let candidates = policy.apply(&accessed, content);

        // LIFO queues: push the lowest priority first
        for candidate in candidates.iter().rev() {
            if let Err(e) = self.prefetch(candidate.category(), candidate.key()) {
                warn!("prefetch policy proposed {} after {}: {}", candidate, accessed, e);
            }
        }
    }

    /// Queue `(category, key)` for background production
    pub fn prefetch(&self, category: Category, key: &str) -> Result<EnqueueOutcome, CacheError> {
        debug!("enqueuing prefetch {}", key);
        Ok(self.category_scheduler(category)?.prefetch(key))
    }

    /// Remove `(category, key)` from the store and suppress any in-flight
    /// background computation of it
    pub fn invalidate(&self, category: Category, key: &str) -> Result<(), CacheError> {
        self.store.lock().invalidate(category, key)?;
        self.category_scheduler(category)?.invalidate(key);
        Ok(())
    }

    /// Replace the active prefetch policy
    pub fn register_policy(&self, policy: impl PrefetchPolicy + 'static) {
        let slot = self.policy.lock();
        *slot.borrow_mut() = Some(Arc::new(policy));
        info!("prefetch policy installed");
    }

    /// Remove the active prefetch policy, disabling prefetch on access
    pub fn clear_policy(&self) {
        let slot = self.policy.lock();
        *slot.borrow_mut() = None;
        info!("prefetch policy removed");
    }

    pub fn has_policy(&self) -> bool {
        self.policy.lock().borrow().is_some()
    }

    pub fn is_cached(&self, category: Category, key: &str) -> Result<bool, CacheError> {
        self.store.lock().is_cached(category, key)
    }

    /// Pending prefetch keys of `category`, next to be computed first
    pub fn pending_prefetches(&self, category: Category) -> Result<Vec<String>, CacheError> {
        Ok(self.category_scheduler(category)?.pending())
    }

    pub fn prefetch_stats(&self, category: Category) -> Result<PrefetchStatsSnapshot, CacheError> {
        Ok(self.category_scheduler(category)?.stats())
    }

    pub fn set_property(&self, property: CacheProperty, value: &str) -> Result<(), CacheError> {
        self.store.lock().set_property(property, value)
    }

    pub fn lookup_property(&self, property: CacheProperty) -> Result<Option<String>, CacheError> {
        self.store.lock().lookup_property(property)
    }

    /// Drop every stored artifact
    pub fn clear(&self) -> Result<(), CacheError> {
        info!("clearing the cache");
        self.store.lock().clear()
    }
}

impl Drop for CacheScheduler {
    fn drop(&mut self) {
        debug!(
            "shutting down cache scheduler with {} categories",
            self.categories.len()
        );
        // Dropping each category scheduler joins its workers.
        self.categories.clear();
    }
}
