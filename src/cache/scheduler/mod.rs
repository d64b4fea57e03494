//! Scheduling of foreground accesses and background prefetch

pub mod category;
pub mod core;

pub use self::category::CategoryScheduler;
pub use self::core::CacheScheduler;
