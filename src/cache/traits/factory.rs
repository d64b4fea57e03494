//! Producer of artifact content on demand

use crate::cache::error::CacheError;

/// Computes the content of one key of a category
///
/// Factories are called without the store lock held, from the foreground
/// `access` path and from every prefetch worker of their category. They must
/// therefore tolerate concurrent calls for distinct keys, and occasionally for
/// the same key when a foreground miss races a background prefetch.
pub trait CacheFactory: Send + Sync {
    /// Produce the content for `key`
    ///
    /// `Ok(None)` means the key cannot be produced (for instance the source
    /// resource does not exist). `Err` reports a failure while producing it;
    /// return [`CacheError::ResourceExhausted`] when the failure is due to
    /// memory pressure.
    fn create(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Drop any staged or derived state held for `key`
    fn invalidate(&self, _key: &str) {}
}

impl<F> CacheFactory for F
where
    F: Fn(&str) -> Result<Option<Vec<u8>>, CacheError> + Send + Sync,
{
    fn create(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self(key)
    }
}
