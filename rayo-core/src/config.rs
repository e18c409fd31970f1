use std::time::Duration;

use crate::CacheError;

/// Accuracy/cost tradeoff for the value sizer.
///
/// The sizer estimates the byte footprint of produced values. Deeper
/// traversal yields better estimates at a higher per-insert cost.
///
/// # Variants
///
/// * `Fast` - near-O(1); only type layout and top-level string/collection
///   lengths are counted. Nested values contribute a fixed opaque cost.
/// * `Balanced` - walks two levels of children and samples up to 32
///   collection elements. The default.
/// * `Accurate` - walks three levels and samples up to 64 elements.
/// * `Adaptive` - walks like `Accurate` but only dives into children whose
///   layout can carry further references, and caps reference-bearing
///   collection traversal at the cube root of the collection length.
///
/// All modes are cycle-safe and deterministic for structurally identical
/// inputs within a single process lifetime.
///
/// # Examples
///
/// ```
/// use rayo_core::SizeMode;
///
/// let mode: SizeMode = "adaptive".into();
/// assert_eq!(mode, SizeMode::Adaptive);
///
/// // Unrecognized strings fall back to the default
/// let mode: SizeMode = "whatever".into();
/// assert_eq!(mode, SizeMode::Balanced);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeMode {
    Fast,
    Balanced,
    Accurate,
    Adaptive,
}

impl Default for SizeMode {
    fn default() -> Self {
        SizeMode::Balanced
    }
}

impl From<&str> for SizeMode {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "fast" => SizeMode::Fast,
            "accurate" => SizeMode::Accurate,
            "adaptive" => SizeMode::Adaptive,
            _ => SizeMode::Balanced,
        }
    }
}

/// Order in which the capacity enforcer evicts entries when the cache is
/// over its byte limit.
///
/// * `SmallestFirst` - evict entries in ascending size order. Keeps the
///   few big entries that presumably cost the most to produce.
/// * `LargestFirst` - evict entries in descending size order. Frees the
///   most bytes per eviction, so fewer entries are lost overall.
///
/// Ties on size are broken by key ordering, so eviction is deterministic
/// given the same cache contents.
///
/// # Examples
///
/// ```
/// use rayo_core::EvictionStrategy;
///
/// let strategy: EvictionStrategy = "largestfirst".into();
/// assert_eq!(strategy, EvictionStrategy::LargestFirst);
///
/// assert_eq!(EvictionStrategy::default(), EvictionStrategy::SmallestFirst);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictionStrategy {
    SmallestFirst,
    LargestFirst,
}

impl Default for EvictionStrategy {
    fn default() -> Self {
        EvictionStrategy::SmallestFirst
    }
}

impl From<&str> for EvictionStrategy {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "largestfirst" | "largest_first" | "largest" => EvictionStrategy::LargestFirst,
            _ => EvictionStrategy::SmallestFirst,
        }
    }
}

/// Configuration for a [`RayoCache`](crate::RayoCache).
///
/// Immutable after construction. Build one with struct-update syntax over
/// [`CacheConfig::default()`] and pass it to
/// [`RayoCache::with_config`](crate::RayoCache::with_config), which
/// validates it.
///
/// # Fields
///
/// * `default_retention_ms` - TTL applied when neither the caller nor the
///   producer overrides it. Must be > 0.
/// * `cleanup_interval` - cadence of the keyed-lock sweeper that reclaims
///   idle lock slots. Must be non-zero.
/// * `max_top_slowest` - size of the slowest-producer top-N collection;
///   0 disables slow-query tracking.
/// * `max_top_heaviest` - size of the heaviest-entry top-N collection;
///   0 disables heavy-entry tracking. If this is 0 *and* no capacity limit
///   is set, the sizer is never invoked and `approximate_bytes` reads 0.
/// * `max_cache_size_bytes` - capacity bound; `None` disables enforcement.
/// * `size_mode` - sizer accuracy/cost tradeoff.
/// * `eviction_strategy` - order of capacity evictions.
/// * `enable_statistics` - initialize statistics at construction instead of
///   waiting for an explicit
///   [`initialize_statistics`](crate::RayoCache::initialize_statistics) call.
///
/// # Examples
///
/// ```
/// use rayo_core::{CacheConfig, EvictionStrategy, RayoCache};
///
/// let cache = RayoCache::<String>::with_config(CacheConfig {
///     default_retention_ms: 30_000,
///     max_cache_size_bytes: Some(64 * 1024 * 1024),
///     eviction_strategy: EvictionStrategy::LargestFirst,
///     ..CacheConfig::default()
/// })
/// .unwrap();
/// # cache.dispose();
/// ```
#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub default_retention_ms: i64,
    pub cleanup_interval: Duration,
    pub max_top_slowest: u32,
    pub max_top_heaviest: u32,
    pub max_cache_size_bytes: Option<u64>,
    pub size_mode: SizeMode,
    pub eviction_strategy: EvictionStrategy,
    pub enable_statistics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_retention_ms: 60_000,
            cleanup_interval: Duration::from_secs(10),
            max_top_slowest: 10,
            max_top_heaviest: 10,
            max_cache_size_bytes: None,
            size_mode: SizeMode::default(),
            eviction_strategy: EvictionStrategy::default(),
            enable_statistics: false,
        }
    }
}

impl CacheConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfiguration`] when
    /// `default_retention_ms` is not strictly positive or when
    /// `cleanup_interval` is zero.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.default_retention_ms <= 0 {
            return Err(CacheError::InvalidConfiguration(format!(
                "default_retention_ms must be > 0, got {}",
                self.default_retention_ms
            )));
        }
        if self.cleanup_interval.is_zero() {
            return Err(CacheError::InvalidConfiguration(
                "cleanup_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// True when produced values need to be sized at all: either a capacity
    /// bound is enforced or heavy-entry tracking is on.
    pub(crate) fn sizing_enabled(&self) -> bool {
        self.max_cache_size_bytes.is_some() || self.max_top_heaviest > 0
    }
}
