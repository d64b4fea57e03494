//! Background prefetch infrastructure
//!
//! Every registered category gets one [`PrefetchQueue`] and a fixed pool of
//! [`PrefetchWorker`] threads draining it. Workers poll the queue with a
//! bounded wait so they notice shutdown requests promptly.

pub mod prefetcher;
pub mod queue;
pub mod statistics;

pub use prefetcher::PrefetchWorker;
pub(crate) use prefetcher::WorkerContext;
pub use queue::{EnqueueOutcome, PrefetchQueue};
pub use statistics::{PrefetchStats, PrefetchStatsSnapshot};
