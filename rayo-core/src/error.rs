use thiserror::Error;

/// Errors produced by the cache itself.
///
/// Producer failures are deliberately *not* represented here: a fallible
/// producer runs through [`try_get_or_compute`](crate::RayoCache::try_get_or_compute)
/// and its own error type flows back to the caller untouched. `CacheError`
/// only covers construction and lifecycle problems of the cache.
///
/// # Examples
///
/// ```
/// use rayo_core::{CacheConfig, CacheError, RayoCache};
///
/// let config = CacheConfig {
///     default_retention_ms: 0,
///     ..CacheConfig::default()
/// };
/// let result = RayoCache::<String>::with_config(config);
/// assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
/// ```
#[derive(Debug, Error)]
pub enum CacheError {
    /// A constructor argument was out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A process-wide holder was initialized twice.
    #[error("global cache holder is already initialized")]
    AlreadyInitialized,
}
