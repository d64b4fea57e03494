//! Configuration types for the scheduler and the viewer bootstrap
//!
//! Both structs deserialize from JSON with per-field defaults, so a host can
//! hand over a partial configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::error::CacheError;

/// Scheduler-wide settings applied to every registered category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Capacity of each category's prefetch queue
    #[serde(default = "default_max_prefetch_size")]
    pub max_prefetch_size: usize,
    /// How long an idle worker waits on its queue before re-checking the stop
    /// flag (milliseconds)
    #[serde(default = "default_dequeue_timeout_ms")]
    pub dequeue_timeout_ms: u64,
}

fn default_max_prefetch_size() -> usize {
    100
}
fn default_dequeue_timeout_ms() -> u64 {
    500
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_prefetch_size: default_max_prefetch_size(),
            dequeue_timeout_ms: default_dequeue_timeout_ms(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_max_prefetch_size(mut self, size: usize) -> Self {
        self.max_prefetch_size = size;
        self
    }

    pub fn with_dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[inline]
    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.max_prefetch_size == 0 {
            return Err(CacheError::invalid_configuration(
                "max_prefetch_size cannot be zero",
            ));
        }
        if self.dequeue_timeout_ms == 0 {
            return Err(CacheError::invalid_configuration(
                "dequeue_timeout_ms cannot be zero",
            ));
        }
        Ok(())
    }
}

/// Host configuration section for the viewer cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ViewerCacheConfig {
    /// Byte quota of the decoded-image category, in megabytes
    #[serde(default = "default_cache_size_mb")]
    pub cache_size: u64,
    /// Worker threads decoding images in the background
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Entry quota of the series-information category
    #[serde(default = "default_series_quota")]
    pub series_quota: u32,
    #[serde(default = "default_max_prefetch_size")]
    pub max_prefetch_size: usize,
    /// Slices prefetched when a series is first opened
    #[serde(default = "default_prefetch_forward")]
    pub prefetch_forward: usize,
    /// Encoding tag prepended to slice ids when prefetching from a series
    #[serde(default = "default_compression_tag")]
    pub compression_tag: String,
}

fn default_cache_size_mb() -> u64 {
    100
}
fn default_threads() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2);
    (cores / 2).max(1)
}
fn default_series_quota() -> u32 {
    1000
}
fn default_prefetch_forward() -> usize {
    10
}
fn default_compression_tag() -> String {
    "jpeg95".to_string()
}

impl Default for ViewerCacheConfig {
    fn default() -> Self {
        Self {
            cache_size: default_cache_size_mb(),
            threads: default_threads(),
            series_quota: default_series_quota(),
            max_prefetch_size: default_max_prefetch_size(),
            prefetch_forward: default_prefetch_forward(),
            compression_tag: default_compression_tag(),
        }
    }
}

const BYTES_PER_MB: u64 = 1024 * 1024;

impl ViewerCacheConfig {
    /// Parse a JSON configuration section and validate it
    pub fn from_json(json: &str) -> Result<Self, CacheError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CacheError::invalid_configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.threads == 0 {
            return Err(CacheError::invalid_configuration("Threads cannot be zero"));
        }
        if self.cache_size == 0 {
            return Err(CacheError::invalid_configuration("CacheSize cannot be zero"));
        }
        if self.cache_size.checked_mul(BYTES_PER_MB).is_none() {
            return Err(CacheError::invalid_configuration(format!(
                "CacheSize of {} MB does not fit in a byte quota",
                self.cache_size
            )));
        }
        if self.max_prefetch_size == 0 {
            return Err(CacheError::invalid_configuration(
                "MaxPrefetchSize cannot be zero",
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn cache_size_bytes(&self) -> u64 {
        self.cache_size.saturating_mul(BYTES_PER_MB)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default().with_max_prefetch_size(self.max_prefetch_size)
    }
}
