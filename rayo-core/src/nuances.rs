use std::sync::atomic::{AtomicI64, Ordering};

/// Sentinel for "the producer never set a retention".
const UNSET: i64 = i64::MIN;

/// Per-call channel through which a producer adjusts how its own result is
/// retained.
///
/// The engine hands every producer invocation a fresh `Nuances`. A producer
/// that wants a non-default lifetime for the value it is about to return
/// calls [`set_cache_retention_ms`](Nuances::set_cache_retention_ms); a
/// producer that decides its result should not be cached at all calls
/// [`skip_caching`](Nuances::skip_caching). The engine reads the value back
/// after the producer returns, so the last write wins.
///
/// A retention set here overrides both the per-call TTL argument and the
/// cache's `default_retention_ms`, for this entry only.
///
/// Interior mutability is deliberate: async producers receive an
/// `Arc<Nuances>` and may set the retention at any point before their
/// future completes, including after awaits.
///
/// # Examples
///
/// ```
/// use rayo_core::Nuances;
///
/// let nuances = Nuances::new();
/// assert_eq!(nuances.cache_retention_ms(), None);
///
/// nuances.set_cache_retention_ms(5_000);
/// assert_eq!(nuances.cache_retention_ms(), Some(5_000));
///
/// nuances.skip_caching();
/// assert_eq!(nuances.cache_retention_ms(), Some(0));
/// ```
#[derive(Debug)]
pub struct Nuances {
    retention_ms: AtomicI64,
}

impl Nuances {
    /// Creates a fresh `Nuances` with no retention override.
    pub fn new() -> Self {
        Self {
            retention_ms: AtomicI64::new(UNSET),
        }
    }

    /// Overrides the retention of the entry this producer run is about to
    /// create, in milliseconds.
    ///
    /// `0` means "return the value to callers but do not insert an entry".
    /// Negative values are treated as `0` by the engine.
    pub fn set_cache_retention_ms(&self, ms: i64) {
        // UNSET is reserved; the closest representable override is i64::MIN + 1,
        // which the engine clamps to 0 anyway.
        let ms = if ms == UNSET { UNSET + 1 } else { ms };
        self.retention_ms.store(ms, Ordering::Release);
    }

    /// Shorthand for `set_cache_retention_ms(0)`: the produced value is
    /// returned to all waiting callers but never stored.
    pub fn skip_caching(&self) {
        self.set_cache_retention_ms(0);
    }

    /// The retention override the producer set, if any.
    pub fn cache_retention_ms(&self) -> Option<i64> {
        match self.retention_ms.load(Ordering::Acquire) {
            UNSET => None,
            ms => Some(ms),
        }
    }
}

impl Default for Nuances {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_by_default() {
        assert_eq!(Nuances::new().cache_retention_ms(), None);
    }

    #[test]
    fn test_last_write_wins() {
        let nuances = Nuances::new();
        nuances.set_cache_retention_ms(1_000);
        nuances.set_cache_retention_ms(2_000);
        assert_eq!(nuances.cache_retention_ms(), Some(2_000));
    }

    #[test]
    fn test_skip_caching_sets_zero() {
        let nuances = Nuances::new();
        nuances.skip_caching();
        assert_eq!(nuances.cache_retention_ms(), Some(0));
    }

    #[test]
    fn test_sentinel_value_is_not_representable() {
        let nuances = Nuances::new();
        nuances.set_cache_retention_ms(i64::MIN);
        // Still reads as "set", never flips back to None.
        assert!(nuances.cache_retention_ms().is_some());
    }
}
