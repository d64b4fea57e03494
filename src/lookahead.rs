//! Viewer-facing entry point
//!
//! [`Lookahead`] wires a [`CacheScheduler`] the way the image viewer uses it:
//! a series-information category, a decoded-image category, the viewer
//! prefetch policy, version stamping of the store and invalidation of series
//! information when new instances arrive.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::{debug, error, info, warn};

use crate::cache::config::ViewerCacheConfig;
use crate::cache::error::CacheError;
use crate::cache::index::{CacheProperty, Category};
use crate::cache::policy::ViewerPrefetchPolicy;
use crate::cache::scheduler::CacheScheduler;
use crate::cache::store::{self, MemoryStore, SharedStore};
use crate::cache::traits::{CacheFactory, CacheStore};

const LISTENER_POLL: Duration = Duration::from_millis(100);

/// Finds the series an instance belongs to
pub trait SeriesResolver: Send + Sync {
    fn parent_series(&self, instance_id: &str) -> Option<String>;
}

impl<F> SeriesResolver for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn parent_series(&self, instance_id: &str) -> Option<String> {
        self(instance_id)
    }
}

/// Image viewer cache with background prefetch
pub struct Lookahead {
    scheduler: Arc<CacheScheduler>,
    config: ViewerCacheConfig,
    new_instances: Option<Sender<String>>,
    stop: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
}

impl Lookahead {
    pub fn builder() -> LookaheadBuilder {
        LookaheadBuilder::new()
    }

    pub fn scheduler(&self) -> &Arc<CacheScheduler> {
        &self.scheduler
    }

    pub fn config(&self) -> &ViewerCacheConfig {
        &self.config
    }

    /// Series information of `series_id`, produced on a miss
    pub fn series_information(&self, series_id: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.scheduler.access(Category::SERIES_INFORMATION, series_id)
    }

    /// Decoded image addressed by `key`, produced on a miss
    pub fn decoded_image(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.scheduler.access(Category::DECODED_IMAGE, key)
    }

    /// Clear the store unless it was stamped by these exact versions
    ///
    /// Returns whether the store was cleared.
    pub fn ensure_versions(&self, host: &str, viewer: &str) -> Result<bool, CacheError> {
        let stored_host = self.scheduler.lookup_property(CacheProperty::HostVersion)?;
        let stored_viewer = self.scheduler.lookup_property(CacheProperty::ViewerVersion)?;

        if stored_host.as_deref() == Some(host) && stored_viewer.as_deref() == Some(viewer) {
            info!("cache versions up to date (host {}, viewer {})", host, viewer);
            return Ok(false);
        }

        info!(
            "cache was produced by host {:?} / viewer {:?}, clearing it for host {} / viewer {}",
            stored_host, stored_viewer, host, viewer
        );
        self.scheduler.clear()?;
        self.scheduler.set_property(CacheProperty::HostVersion, host)?;
        self.scheduler.set_property(CacheProperty::ViewerVersion, viewer)?;
        Ok(true)
    }

    /// Report a newly received instance so that the cached information of
    /// its series gets refreshed
    pub fn signal_new_instance(&self, instance_id: &str) {
        match &self.new_instances {
            Some(sender) => {
                if sender.send(instance_id.to_string()).is_err() {
                    warn!("new instance listener is gone, dropping {}", instance_id);
                }
            }
            None => debug!("no series resolver, ignoring new instance {}", instance_id),
        }
    }
}

impl Drop for Lookahead {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.new_instances.take();
        if let Some(handle) = self.listener.take() {
            if handle.join().is_err() {
                error!("new instance listener terminated abnormally");
            }
        }
    }
}

fn listen_for_new_instances(
    scheduler: &CacheScheduler,
    resolver: &dyn SeriesResolver,
    instances: &Receiver<String>,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::Acquire) {
        let instance_id = match instances.recv_timeout(LISTENER_POLL) {
            Ok(id) => id,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let Some(series_id) = resolver.parent_series(&instance_id) else {
            debug!("no parent series for new instance {}", instance_id);
            continue;
        };

        debug!("new instance {} invalidates series {}", instance_id, series_id);
        if let Err(e) = scheduler.invalidate(Category::SERIES_INFORMATION, &series_id) {
            warn!("cannot invalidate series {}: {}", series_id, e);
        }
    }
}

/// Builder wiring the viewer categories and policy
pub struct LookaheadBuilder {
    config: ViewerCacheConfig,
    store: Option<SharedStore>,
    series_factory: Option<Arc<dyn CacheFactory>>,
    image_factory: Option<Arc<dyn CacheFactory>>,
    resolver: Option<Arc<dyn SeriesResolver>>,
}

impl Default for LookaheadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LookaheadBuilder {
    pub fn new() -> Self {
        Self {
            config: ViewerCacheConfig::default(),
            store: None,
            series_factory: None,
            image_factory: None,
            resolver: None,
        }
    }

    pub fn config(mut self, config: ViewerCacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Backing store, an unbounded [`MemoryStore`] by default
    pub fn store(mut self, store: impl CacheStore + 'static) -> Self {
        self.store = Some(store::shared(store));
        self
    }

    pub fn series_factory(self, factory: impl CacheFactory + 'static) -> Self {
        self.series_factory_shared(Arc::new(factory))
    }

    pub fn series_factory_shared(mut self, factory: Arc<dyn CacheFactory>) -> Self {
        self.series_factory = Some(factory);
        self
    }

    pub fn image_factory(self, factory: impl CacheFactory + 'static) -> Self {
        self.image_factory_shared(Arc::new(factory))
    }

    pub fn image_factory_shared(mut self, factory: Arc<dyn CacheFactory>) -> Self {
        self.image_factory = Some(factory);
        self
    }

    /// Enables invalidation of series information on new instances
    pub fn series_resolver(mut self, resolver: impl SeriesResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn build(self) -> Result<Lookahead, CacheError> {
        self.config.validate()?;
        let series_factory = self.series_factory.ok_or_else(|| {
            CacheError::invalid_configuration("a series information factory is required")
        })?;
        let image_factory = self.image_factory.ok_or_else(|| {
            CacheError::invalid_configuration("a decoded image factory is required")
        })?;

        let store = self
            .store
            .unwrap_or_else(|| store::shared(MemoryStore::new()));
        let scheduler = CacheScheduler::with_config(store, self.config.scheduler_config())?
            .with_policy(ViewerPrefetchPolicy::from_config(&self.config));

        scheduler.register_shared(Category::SERIES_INFORMATION, series_factory, 1)?;
        scheduler.set_quota(Category::SERIES_INFORMATION, self.config.series_quota, 0)?;
        scheduler.register_shared(Category::DECODED_IMAGE, image_factory, self.config.threads)?;
        scheduler.set_quota(Category::DECODED_IMAGE, 0, self.config.cache_size_bytes())?;

        let scheduler = Arc::new(scheduler);
        let stop = Arc::new(AtomicBool::new(false));
        let (new_instances, listener) = match self.resolver {
            Some(resolver) => {
                let (tx, rx) = unbounded();
                let handle = {
                    let scheduler = Arc::clone(&scheduler);
                    let stop = Arc::clone(&stop);
                    thread::Builder::new()
                        .name("new-instance-listener".to_string())
                        .spawn(move || {
                            listen_for_new_instances(&scheduler, resolver.as_ref(), &rx, &stop)
                        })
                        .map_err(|e| CacheError::WorkerSpawnFailed(e.to_string()))?
                };
                (Some(tx), Some(handle))
            }
            None => (None, None),
        };

        info!(
            "viewer cache ready: {} MB of images over {} threads, {} series",
            self.config.cache_size, self.config.threads, self.config.series_quota
        );

        Ok(Lookahead {
            scheduler,
            config: self.config,
            new_instances,
            stop,
            listener,
        })
    }
}
