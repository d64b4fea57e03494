//! Error types for the cache scheduler
//!
//! Programmer errors (duplicate registration, unknown category, bad
//! configuration) are kept apart from artifact failures. A factory that simply
//! cannot produce a key is not an error at all: it surfaces as `Ok(None)`.

use super::index::{CacheIndex, Category};

/// Broad classification used for logging and recovery decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Misuse of the scheduler; never recovers by retrying
    Configuration,
    /// A factory failed while producing an artifact
    Factory,
    /// Memory or another resource ran out while producing an artifact
    Resource,
    /// The backing store rejected an operation
    Storage,
    /// Background worker infrastructure failure
    Worker,
}

/// Errors returned by scheduler, store and factory operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    CategoryAlreadyRegistered(Category),
    CategoryNotRegistered(Category),
    InvalidConfiguration(String),
    FactoryFailed { index: CacheIndex, reason: String },
    ResourceExhausted(String),
    StorageError(String),
    WorkerSpawnFailed(String),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::CategoryAlreadyRegistered(category) => {
                write!(f, "Category already registered: {}", category)
            }
            CacheError::CategoryNotRegistered(category) => {
                write!(f, "No factory registered for category: {}", category)
            }
            CacheError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            CacheError::FactoryFailed { index, reason } => {
                write!(f, "Factory failed to produce {}: {}", index, reason)
            }
            CacheError::ResourceExhausted(msg) => write!(f, "Resource exhausted: {}", msg),
            CacheError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            CacheError::WorkerSpawnFailed(msg) => {
                write!(f, "Failed to spawn prefetch worker: {}", msg)
            }
        }
    }
}

impl std::error::Error for CacheError {}

impl CacheError {
    /// Create invalid configuration error
    #[inline]
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create factory failure for the given artifact
    #[inline]
    pub fn factory_failed(index: CacheIndex, reason: impl Into<String>) -> Self {
        Self::FactoryFailed {
            index,
            reason: reason.into(),
        }
    }

    /// Create resource exhaustion error
    #[inline]
    pub fn resource_exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    /// Create storage error
    #[inline]
    pub fn storage_error(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::CategoryAlreadyRegistered(_)
            | Self::CategoryNotRegistered(_)
            | Self::InvalidConfiguration(_) => ErrorClass::Configuration,
            Self::FactoryFailed { .. } => ErrorClass::Factory,
            Self::ResourceExhausted(_) => ErrorClass::Resource,
            Self::StorageError(_) => ErrorClass::Storage,
            Self::WorkerSpawnFailed(_) => ErrorClass::Worker,
        }
    }

    /// Whether this error reports misuse of the scheduler rather than a
    /// runtime failure
    #[inline]
    pub fn is_configuration(&self) -> bool {
        self.class() == ErrorClass::Configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_classified() {
        assert!(CacheError::CategoryAlreadyRegistered(Category(3)).is_configuration());
        assert!(CacheError::CategoryNotRegistered(Category(3)).is_configuration());
        assert!(CacheError::invalid_configuration("zero threads").is_configuration());

        let index = CacheIndex::new(Category::DECODED_IMAGE, "a/0/low-quality");
        let err = CacheError::factory_failed(index, "decoder crashed");
        assert_eq!(err.class(), ErrorClass::Factory);
        assert!(!err.is_configuration());
        assert_eq!(
            CacheError::resource_exhausted("oom").class(),
            ErrorClass::Resource
        );
    }

    #[test]
    fn test_display_mentions_the_artifact() {
        let index = CacheIndex::new(Category::SERIES_INFORMATION, "series-1");
        let err = CacheError::factory_failed(index, "bad json");
        assert_eq!(
            err.to_string(),
            "Factory failed to produce series-information:series-1: bad json"
        );
    }
}
