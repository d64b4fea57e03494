//! Bounded, deduplicated LIFO queue of keys awaiting prefetch
//!
//! The most recently enqueued key is served first: fresh requests describe
//! what the user is looking at now, while older ones are likely stale. When
//! the queue is full the oldest pending key is discarded.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Result of an enqueue request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Key pushed on top of the stack
    Queued,
    /// Key already pending; nothing changed
    AlreadyPending,
    /// Key pushed on top; the carried key fell off the bottom
    QueuedDroppingOldest(String),
    /// Queue closed for shutdown; key ignored
    Closed,
}

#[derive(Debug, Default)]
struct QueueState {
    /// Back is the top of the stack
    stack: VecDeque<String>,
    pending: HashSet<String>,
    closed: bool,
}

/// Prefetch queue of one category, shared by its producers and workers
#[derive(Debug)]
pub struct PrefetchQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    capacity: usize,
}

impl PrefetchQueue {
    /// Create a queue holding at most `capacity` pending keys
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                stack: VecDeque::with_capacity(capacity),
                ..QueueState::default()
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    pub fn enqueue(&self, key: &str) -> EnqueueOutcome {
        let outcome = {
            let mut state = self.state.lock();
            if state.closed {
                return EnqueueOutcome::Closed;
            }
            if state.pending.contains(key) {
                return EnqueueOutcome::AlreadyPending;
            }

            state.pending.insert(key.to_string());
            state.stack.push_back(key.to_string());

            if state.stack.len() > self.capacity {
                match state.stack.pop_front() {
                    Some(oldest) => {
                        state.pending.remove(&oldest);
                        EnqueueOutcome::QueuedDroppingOldest(oldest)
                    }
                    None => EnqueueOutcome::Queued,
                }
            } else {
                EnqueueOutcome::Queued
            }
        };

        self.available.notify_one();
        outcome
    }

    /// Pop the most recently enqueued key, waiting up to `timeout`
    ///
    /// Returns `None` on timeout or once the queue has been closed.
    pub fn dequeue(&self, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        loop {
            if state.closed {
                return None;
            }
            if let Some(key) = state.stack.pop_back() {
                state.pending.remove(&key);
                return Some(key);
            }
            if self.available.wait_until(&mut state, deadline).timed_out() {
                if state.closed {
                    return None;
                }
                let key = state.stack.pop_back()?;
                state.pending.remove(&key);
                return Some(key);
            }
        }
    }

    /// Refuse further work and wake every blocked consumer
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.state.lock().pending.contains(key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().stack.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pending keys in the order they would be dequeued
    pub fn snapshot(&self) -> Vec<String> {
        self.state.lock().stack.iter().rev().cloned().collect()
    }
}
