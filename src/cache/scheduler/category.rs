//! Per-category scheduling: one factory, one queue, one worker pool

use std::sync::Arc;

use log::{debug, info, warn};

use crate::cache::config::SchedulerConfig;
use crate::cache::error::CacheError;
use crate::cache::index::Category;
use crate::cache::store::SharedStore;
use crate::cache::traits::CacheFactory;
use crate::cache::worker::{
    EnqueueOutcome, PrefetchQueue, PrefetchStats, PrefetchStatsSnapshot, PrefetchWorker,
    WorkerContext,
};

/// Owns everything registered for one category
///
/// Dropping the scheduler closes its queue and joins every worker thread; the
/// factory is released once the last worker is gone.
pub struct CategoryScheduler {
    category: Category,
    factory: Arc<dyn CacheFactory>,
    queue: Arc<PrefetchQueue>,
    stats: Arc<PrefetchStats>,
    workers: Vec<PrefetchWorker>,
}

impl CategoryScheduler {
    pub(crate) fn new(
        category: Category,
        factory: Arc<dyn CacheFactory>,
        store: SharedStore,
        num_threads: usize,
        config: &SchedulerConfig,
    ) -> Result<Self, CacheError> {
        if num_threads == 0 {
            return Err(CacheError::invalid_configuration(format!(
                "category {} needs at least one prefetch thread",
                category
            )));
        }

        let queue = Arc::new(PrefetchQueue::new(config.max_prefetch_size));
        let stats = Arc::new(PrefetchStats::default());

        let context = Arc::new(WorkerContext {
            category,
            factory: Arc::clone(&factory),
            store,
            queue: Arc::clone(&queue),
            stats: Arc::clone(&stats),
            dequeue_timeout: config.dequeue_timeout(),
        });

        let mut scheduler = Self {
            category,
            factory,
            queue,
            stats,
            workers: Vec::with_capacity(num_threads),
        };

        // On a spawn failure `scheduler` is dropped, joining the workers
        // already started.
        for id in 0..num_threads {
            let worker = PrefetchWorker::spawn(id, Arc::clone(&context))?;
            scheduler.workers.push(worker);
        }

        info!(
            "registered {} with {} prefetch threads (queue capacity {})",
            category,
            num_threads,
            scheduler.queue.capacity()
        );
        Ok(scheduler)
    }

    #[inline]
    pub fn category(&self) -> Category {
        self.category
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Queue `key` for background production
    pub fn prefetch(&self, key: &str) -> EnqueueOutcome {
        let outcome = self.queue.enqueue(key);
        match &outcome {
            EnqueueOutcome::Queued => PrefetchStats::bump(&self.stats.enqueued),
            EnqueueOutcome::AlreadyPending => PrefetchStats::bump(&self.stats.deduplicated),
            EnqueueOutcome::QueuedDroppingOldest(dropped) => {
                PrefetchStats::bump(&self.stats.enqueued);
                PrefetchStats::bump(&self.stats.dropped);
                warn!(
                    "prefetch queue of {} is full, dropping oldest pending {}",
                    self.category, dropped
                );
            }
            EnqueueOutcome::Closed => {
                debug!("prefetch queue of {} is closed, ignoring {}", self.category, key);
            }
        }
        outcome
    }

    /// Cancel best-effort any in-flight computation of `key` and let the
    /// factory drop its staged state
    pub fn invalidate(&self, key: &str) {
        let affected = self
            .workers
            .iter()
            .filter(|worker| worker.signal_invalidated(key))
            .count();
        if affected > 0 {
            debug!(
                "invalidated {} while {} worker(s) were computing it",
                key, affected
            );
        }
        self.factory.invalidate(key);
    }

    /// Run the factory on the calling thread
    pub fn call_factory(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.factory.create(key)
    }

    pub fn factory(&self) -> &Arc<dyn CacheFactory> {
        &self.factory
    }

    /// Pending keys in the order workers will pick them up
    pub fn pending(&self) -> Vec<String> {
        self.queue.snapshot()
    }

    pub fn stats(&self) -> PrefetchStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for CategoryScheduler {
    fn drop(&mut self) {
        self.queue.close();
        for worker in &self.workers {
            worker.request_stop();
        }
        for worker in &mut self.workers {
            worker.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::{self, MemoryStore};
    use crate::cache::test_support::{GatedFactory, wait_until};
    use std::time::{Duration, Instant};

    const CATEGORY: Category = Category(11);

    fn config() -> SchedulerConfig {
        SchedulerConfig::default().with_dequeue_timeout(Duration::from_millis(20))
    }

    #[test]
    fn test_zero_threads_is_configuration_error() {
        let factory = GatedFactory::open();
        let result = CategoryScheduler::new(
            CATEGORY,
            factory,
            store::shared(MemoryStore::new()),
            0,
            &config(),
        );
        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_prefetch_is_drained_by_workers() {
        let factory = GatedFactory::open();
        let store = store::shared(MemoryStore::new());
        let scheduler = CategoryScheduler::new(
            CATEGORY,
            factory.clone(),
            store.clone(),
            2,
            &config(),
        )
        .unwrap();
        assert_eq!(scheduler.num_workers(), 2);

        for key in ["a", "b", "c"] {
            assert_eq!(scheduler.prefetch(key), EnqueueOutcome::Queued);
        }
        assert!(wait_until(|| scheduler.stats().stored == 3));
        assert!(store.lock().is_cached(CATEGORY, "b").unwrap());
        assert_eq!(factory.calls(), 3);
    }

    #[test]
    fn test_invalidate_reaches_factory_hook() {
        let factory = GatedFactory::open();
        let scheduler = CategoryScheduler::new(
            CATEGORY,
            factory.clone(),
            store::shared(MemoryStore::new()),
            1,
            &config(),
        )
        .unwrap();

        scheduler.invalidate("gone");
        assert_eq!(factory.invalidated(), vec!["gone".to_string()]);
    }

    #[test]
    fn test_drop_joins_workers_promptly() {
        let factory = GatedFactory::open();
        let scheduler = CategoryScheduler::new(
            CATEGORY,
            factory,
            store::shared(MemoryStore::new()),
            4,
            &SchedulerConfig::default(),
        )
        .unwrap();

        // closing the queue wakes idle workers without waiting out the poll
        let started = Instant::now();
        drop(scheduler);
        assert!(started.elapsed() < Duration::from_millis(400));
    }
}
