//! Cache configuration with production defaults

pub mod types;

pub use types::{SchedulerConfig, ViewerCacheConfig};
