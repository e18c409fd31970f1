use std::time::{Duration, Instant};

/// Why an entry left the cache.
///
/// Delivered with every eviction callback, exactly once per removal.
///
/// # Variants
///
/// * `Manual` - an explicit `remove` call, or cache disposal
/// * `Expired` - the entry passed its absolute expiration instant
/// * `Replaced` - a newer insert for the same key displaced it
/// * `Capacity` - the capacity enforcer selected it to get back under the
///   byte limit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictionReason {
    Manual,
    Expired,
    Replaced,
    Capacity,
}

/// One live cache record.
///
/// Entries are owned by the entry store from insertion until eviction;
/// eviction surrenders the entry to the eviction callback.
///
/// # Fields
///
/// * `value` - the produced value
/// * `expires_at` - absolute monotonic expiration instant; always strictly
///   after the insertion instant
/// * `size_bytes` - the sizer's estimate at insertion time (0 when sizing
///   is disabled); the same number the statistics ledger records for this
///   key
/// * `produced_in` - how long the producer ran, for slowest-N tracking
#[derive(Clone, Debug)]
pub struct CacheEntry<T> {
    pub value: T,
    pub expires_at: Instant,
    pub size_bytes: u64,
    pub produced_in: Duration,
}

impl<T> CacheEntry<T> {
    /// Creates an entry expiring at `expires_at`.
    pub fn new(value: T, expires_at: Instant, size_bytes: u64, produced_in: Duration) -> Self {
        Self {
            value,
            expires_at,
            size_bytes,
            produced_in,
        }
    }

    /// True once `now` has reached the entry's expiration instant.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}
