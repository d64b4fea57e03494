//! Background prefetch worker
//!
//! Each worker owns one thread draining its category's shared queue. A worker
//! tracks the single key it is computing so that an invalidation arriving
//! mid-computation can keep the stale result out of the store.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error};
use parking_lot::Mutex;

use super::queue::PrefetchQueue;
use super::statistics::PrefetchStats;
use crate::cache::error::CacheError;
use crate::cache::index::Category;
use crate::cache::store::SharedStore;
use crate::cache::traits::CacheFactory;

/// Everything the workers of one category share
pub(crate) struct WorkerContext {
    pub category: Category,
    pub factory: Arc<dyn CacheFactory>,
    pub store: SharedStore,
    pub queue: Arc<PrefetchQueue>,
    pub stats: Arc<PrefetchStats>,
    pub dequeue_timeout: Duration,
}

/// The worker's "currently computing" slot
#[derive(Debug, Default)]
struct InFlight {
    key: Option<String>,
    invalidated: bool,
}

/// One background thread computing prefetch candidates of a category
pub struct PrefetchWorker {
    id: usize,
    shutdown: Arc<AtomicBool>,
    in_flight: Arc<Mutex<InFlight>>,
    handle: Option<JoinHandle<()>>,
}

impl PrefetchWorker {
    pub(crate) fn spawn(id: usize, context: Arc<WorkerContext>) -> Result<Self, CacheError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let in_flight = Arc::new(Mutex::new(InFlight::default()));

        let handle = {
            let shutdown = Arc::clone(&shutdown);
            let in_flight = Arc::clone(&in_flight);
            thread::Builder::new()
                .name(format!("prefetch-{}-{}", context.category.id(), id))
                .spawn(move || run(&context, &shutdown, &in_flight))
                .map_err(|e| CacheError::WorkerSpawnFailed(e.to_string()))?
        };

        Ok(Self {
            id,
            shutdown,
            in_flight,
            handle: Some(handle),
        })
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Key this worker is computing right now, if any
    pub fn current_key(&self) -> Option<String> {
        self.in_flight.lock().key.clone()
    }

    /// Mark `key` invalidated if this worker is computing it
    ///
    /// Returns whether the in-flight computation was affected.
    pub fn signal_invalidated(&self, key: &str) -> bool {
        let mut slot = self.in_flight.lock();
        if slot.key.as_deref() == Some(key) {
            slot.invalidated = true;
            true
        } else {
            false
        }
    }

    /// Ask the thread to exit after its current iteration
    pub fn request_stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Stop the thread and wait for it
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("prefetch worker {} terminated abnormally", self.id);
            }
        }
    }
}

impl Drop for PrefetchWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(context: &WorkerContext, shutdown: &AtomicBool, in_flight: &Mutex<InFlight>) {
    while !shutdown.load(Ordering::Acquire) {
        let Some(key) = context.queue.dequeue(context.dequeue_timeout) else {
            continue;
        };

        PrefetchStats::bump(&context.stats.dequeued);
        debug!("dequeued prefetching {}", key);

        {
            let mut slot = in_flight.lock();
            slot.key = Some(key.clone());
            slot.invalidated = false;
        }

        prefetch_one(context, &key, in_flight);

        in_flight.lock().key = None;
    }
}

fn prefetch_one(context: &WorkerContext, key: &str, in_flight: &Mutex<InFlight>) {
    let category = context.category;
    let stats = &context.stats;

    let cached = context.store.lock().is_cached(category, key);
    match cached {
        Ok(true) => {
            PrefetchStats::bump(&stats.already_cached);
            return;
        }
        Ok(false) => {}
        Err(e) => {
            error!("cache lookup of {}:{} failed in prefetcher: {}", category, key, e);
            PrefetchStats::bump(&stats.failed);
            return;
        }
    }

    debug!("prefetching {}", key);
    let started = Instant::now();
    let produced = panic::catch_unwind(AssertUnwindSafe(|| context.factory.create(key)));

    let content = match produced {
        Ok(Ok(Some(content))) => content,
        Ok(Ok(None)) => {
            debug!("could not prefetch {}", key);
            PrefetchStats::bump(&stats.not_found);
            return;
        }
        Ok(Err(CacheError::ResourceExhausted(msg))) => {
            error!(
                "Not enough memory for the prefetcher of {} to work ({}): {}",
                category, key, msg
            );
            PrefetchStats::bump(&stats.failed);
            return;
        }
        Ok(Err(e)) => {
            error!("prefetching {}:{} failed: {}", category, key, e);
            PrefetchStats::bump(&stats.failed);
            return;
        }
        Err(_) => {
            error!(
                "Unhandled panic inside the prefetcher of {} while producing {}",
                category, key
            );
            PrefetchStats::bump(&stats.failed);
            return;
        }
    };

    stats.record_produce_time(started.elapsed().as_nanos() as u64);

    // Holding the slot while storing keeps a concurrent invalidation signal
    // either before the check or after the write.
    let slot = in_flight.lock();
    if slot.invalidated {
        debug!("discarding invalidated {}", key);
        PrefetchStats::bump(&stats.invalidated);
        return;
    }

    let stored = {
        let mut store = context.store.lock();
        store
            .store(category, key, &content)
            .and_then(|()| store.is_cached(category, key))
    };
    match stored {
        Ok(true) => {
            debug!("stored {}", key);
            PrefetchStats::bump(&stats.stored);
        }
        Ok(false) => {
            debug!("store refused {}", key);
            PrefetchStats::bump(&stats.rejected);
        }
        Err(e) => {
            error!("storing prefetched {}:{} failed: {}", category, key, e);
            PrefetchStats::bump(&stats.failed);
        }
    }
    drop(slot);
}
