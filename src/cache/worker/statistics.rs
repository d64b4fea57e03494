//! Per-category prefetch statistics
//!
//! Counters are shared by the queue producers and all workers of a category,
//! so every field is an independent cache-padded atomic.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

/// Lock-free counters describing prefetch activity of one category
#[derive(Debug, Default)]
pub struct PrefetchStats {
    /// Keys accepted into the queue
    pub enqueued: CachePadded<AtomicU64>,
    /// Enqueue requests ignored because the key was already pending
    pub deduplicated: CachePadded<AtomicU64>,
    /// Pending keys discarded because the queue overflowed
    pub dropped: CachePadded<AtomicU64>,
    /// Keys taken off the queue by a worker
    pub dequeued: CachePadded<AtomicU64>,
    /// Dequeued keys skipped because they were already stored
    pub already_cached: CachePadded<AtomicU64>,
    /// Keys computed and kept by the store
    pub stored: CachePadded<AtomicU64>,
    /// Keys computed but refused by the store, e.g. larger than its quota
    pub rejected: CachePadded<AtomicU64>,
    /// Keys the factory reported as impossible to produce
    pub not_found: CachePadded<AtomicU64>,
    /// Factory or store failures (including caught panics)
    pub failed: CachePadded<AtomicU64>,
    /// Results discarded because the key was invalidated while computing
    pub invalidated: CachePadded<AtomicU64>,
    /// Running average of factory time for successful productions
    pub avg_produce_time_ns: CachePadded<AtomicU64>,
}

impl PrefetchStats {
    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold one production time into the running average
    pub(crate) fn record_produce_time(&self, elapsed_ns: u64) {
        let count = self.stored.load(Ordering::Relaxed)
            + self.rejected.load(Ordering::Relaxed)
            + self.invalidated.load(Ordering::Relaxed)
            + 1;
        let mut current = self.avg_produce_time_ns.load(Ordering::Relaxed);
        loop {
            let new_avg = if count <= 1 {
                elapsed_ns
            } else {
                let total = u128::from(current) * u128::from(count - 1) + u128::from(elapsed_ns);
                u64::try_from(total / u128::from(count)).unwrap_or(u64::MAX)
            };
            match self.avg_produce_time_ns.compare_exchange_weak(
                current,
                new_avg,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn snapshot(&self) -> PrefetchStatsSnapshot {
        PrefetchStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            already_cached: self.already_cached.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            invalidated: self.invalidated.load(Ordering::Relaxed),
            avg_produce_time_ns: self.avg_produce_time_ns.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PrefetchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchStatsSnapshot {
    pub enqueued: u64,
    pub deduplicated: u64,
    pub dropped: u64,
    pub dequeued: u64,
    pub already_cached: u64,
    pub stored: u64,
    pub rejected: u64,
    pub not_found: u64,
    pub failed: u64,
    pub invalidated: u64,
    pub avg_produce_time_ns: u64,
}

impl PrefetchStatsSnapshot {
    /// Dequeued keys whose processing has finished one way or another
    pub fn settled(&self) -> u64 {
        self.already_cached
            + self.stored
            + self.rejected
            + self.not_found + self.failed + self.invalidated
    }

    pub fn avg_produce_time_ms(&self) -> f64 {
        self.avg_produce_time_ns as f64 / 1_000_000.0
    }
}
