//! Process-wide cache holder.
//!
//! The engine itself never touches global state; applications that want
//! one shared cache instance declare a [`GlobalCacheCell`] in a `static`
//! and go through it. The holder owns exactly one engine with explicit
//! init/teardown, and its [`clear_for_testing`](GlobalCacheCell::clear_for_testing)
//! hook lets test suites tear the instance down between cases.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::{CacheConfig, CacheError, RayoCache};

/// Owns at most one process-wide [`RayoCache`] instance.
///
/// `new` is `const`, so the holder can live in a `static`. The slot is
/// filled either explicitly with [`initialize`](Self::initialize) or
/// implicitly with default configuration on the first
/// [`instance`](Self::instance) call.
///
/// # Examples
///
/// ```
/// use rayo::GlobalCacheCell;
///
/// static CACHE: GlobalCacheCell<String> = GlobalCacheCell::new();
///
/// let value = CACHE
///     .instance()
///     .get_or_compute("motd", || "bienvenido".to_string());
/// assert_eq!(value, "bienvenido");
/// # CACHE.clear_for_testing();
/// ```
pub struct GlobalCacheCell<T: Clone + Send + Sync + 'static> {
    slot: RwLock<Option<Arc<RayoCache<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> GlobalCacheCell<T> {
    /// Creates an empty holder. Usable in `static` position.
    pub const fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Fills the slot with a cache built from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::AlreadyInitialized`] when the slot is already
    /// filled, or [`CacheError::InvalidConfiguration`] when the
    /// configuration fails validation. On error the existing instance, if
    /// any, is untouched.
    pub fn initialize(&self, config: CacheConfig) -> Result<(), CacheError> {
        let mut slot = self.slot.write();
        if slot.is_some() {
            return Err(CacheError::AlreadyInitialized);
        }
        *slot = Some(Arc::new(RayoCache::with_config(config)?));
        Ok(())
    }

    /// The shared instance, creating it with default configuration if the
    /// slot is still empty.
    pub fn instance(&self) -> Arc<RayoCache<T>> {
        if let Some(cache) = self.slot.read().as_ref() {
            return Arc::clone(cache);
        }
        let mut slot = self.slot.write();
        // Raced with another initializer between the locks.
        if let Some(cache) = slot.as_ref() {
            return Arc::clone(cache);
        }
        let cache = Arc::new(RayoCache::new());
        *slot = Some(Arc::clone(&cache));
        cache
    }

    /// The shared instance if one exists; never creates one.
    pub fn try_instance(&self) -> Option<Arc<RayoCache<T>>> {
        self.slot.read().as_ref().map(Arc::clone)
    }

    /// Disposes the held instance and empties the slot.
    ///
    /// Test teardown hook: lets suites that share a `static` holder start
    /// every case from an empty cache. Callers still holding an `Arc` to
    /// the old instance will see its operations panic, as with any
    /// disposed cache. A no-op when the slot is empty.
    pub fn clear_for_testing(&self) {
        if let Some(cache) = self.slot.write().take() {
            cache.dispose();
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for GlobalCacheCell<T> {
    fn default() -> Self {
        Self::new()
    }
}
