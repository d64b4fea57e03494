//! Fakes shared by the unit tests of the scheduler modules

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Condvar, Mutex};

use crate::cache::error::CacheError;
use crate::cache::index::CacheIndex;
use crate::cache::traits::CacheFactory;
use crate::lookahead::SeriesResolver;

const PATIENCE: Duration = Duration::from_secs(5);

/// Poll `condition` until it holds or a generous deadline passes
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + PATIENCE;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Box a closure as a factory, fixing its signature through the bound
pub fn factory_fn<F>(f: F) -> Arc<dyn CacheFactory>
where
    F: Fn(&str) -> Result<Option<Vec<u8>>, CacheError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Pin a closure to the policy signature
pub fn policy_fn<F>(f: F) -> F
where
    F: Fn(&CacheIndex, &[u8]) -> Vec<CacheIndex> + Send + Sync + 'static,
{
    f
}

/// Factory producing `content-<key>` that counts and records its calls and
/// can hold every call at a gate until released
pub struct GatedFactory {
    calls: AtomicUsize,
    order: Mutex<Vec<String>>,
    invalidated: Mutex<Vec<String>>,
    open: Mutex<bool>,
    gate: Condvar,
    started_tx: Sender<String>,
    started_rx: Receiver<String>,
}

impl GatedFactory {
    fn with_gate(open: bool) -> Arc<Self> {
        let (started_tx, started_rx) = unbounded();
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            order: Mutex::new(Vec::new()),
            invalidated: Mutex::new(Vec::new()),
            open: Mutex::new(open),
            gate: Condvar::new(),
            started_tx,
            started_rx,
        })
    }

    /// Calls return immediately
    pub fn open() -> Arc<Self> {
        Self::with_gate(true)
    }

    /// Calls block until [`GatedFactory::release`]
    pub fn closed() -> Arc<Self> {
        Self::with_gate(false)
    }

    pub fn release(&self) {
        *self.open.lock() = true;
        self.gate.notify_all();
    }

    /// Next key whose production started
    pub fn wait_started(&self) -> Option<String> {
        self.started_rx.recv_timeout(PATIENCE).ok()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Keys in the order production started
    pub fn order(&self) -> Vec<String> {
        self.order.lock().clone()
    }

    pub fn invalidated(&self) -> Vec<String> {
        self.invalidated.lock().clone()
    }
}

impl CacheFactory for GatedFactory {
    fn create(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.order.lock().push(key.to_string());
        let _ = self.started_tx.send(key.to_string());

        let mut open = self.open.lock();
        while !*open {
            self.gate.wait(&mut open);
        }
        drop(open);

        Ok(Some(format!("content-{}", key).into_bytes()))
    }

    fn invalidate(&self, key: &str) {
        self.invalidated.lock().push(key.to_string());
    }
}

/// Resolver mapping every instance to one series and recording its calls
#[derive(Clone)]
pub struct RecordingResolver {
    parent: String,
    resolved: Arc<Mutex<Vec<String>>>,
}

impl RecordingResolver {
    pub fn with_parent(parent: &str) -> Self {
        Self {
            parent: parent.to_string(),
            resolved: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().clone()
    }
}

impl SeriesResolver for RecordingResolver {
    fn parent_series(&self, instance_id: &str) -> Option<String> {
        self.resolved.lock().push(instance_id.to_string());
        Some(self.parent.clone())
    }
}
