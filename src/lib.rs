//! # Rayo
//!
//! A lightweight, thread-safe, in-process cache whose defining guarantee is
//! **single-flight execution**: when concurrent callers miss on the same
//! key, the producer runs exactly once and every caller receives that one
//! result (or that one failure). Nobody recomputes behind anyone's back.
//!
//! ## Features
//!
//! - **Single-flight misses**: per-key locks serialize producers; waiters
//!   pick up the produced value instead of re-running the work
//! - **Lock-free hits**: a hit is a concurrent-map probe and a clone
//! - **TTL expiration**: a cache-wide default, overridable per call and
//!   per producer run (via [`Nuances`])
//! - **Capacity limits**: approximate byte accounting with deterministic
//!   `SmallestFirst`/`LargestFirst` eviction
//! - **Statistics**: optional hit/miss/eviction counters plus slowest-
//!   producer and heaviest-entry top-N collections
//! - **Sync and async**: every operation has a blocking form and a
//!   suspending `_async` twin
//! - **Auto keys**: [`auto_key!`] derives a stable cache key from the call
//!   site when you don't want to invent one
//!
//! ## Quick Start
//!
//! ```rust
//! use rayo::RayoCache;
//!
//! let cache: RayoCache<String> = RayoCache::new();
//!
//! // First call runs the producer.
//! let report = cache.get_or_compute("daily-report", || {
//!     "an expensive aggregation".to_string()
//! });
//!
//! // Second call is served from cache; the closure never runs.
//! let cached = cache.get_or_compute("daily-report", || unreachable!());
//! assert_eq!(report, cached);
//! # cache.dispose();
//! ```
//!
//! ## Producer-Controlled Retention
//!
//! A producer can adjust how long its own result lives - or opt out of
//! caching entirely - through the [`Nuances`] it receives:
//!
//! ```rust
//! use rayo::RayoCache;
//!
//! let cache: RayoCache<Vec<String>> = RayoCache::new();
//! let rows = cache.get_or_compute_nuanced("active-users", |nuances| {
//!     let rows = vec!["ana".to_string(), "bea".to_string()];
//!     if rows.is_empty() {
//!         // Don't cache empty result sets; retry on the next call.
//!         nuances.skip_caching();
//!     }
//!     rows
//! });
//! assert_eq!(rows.len(), 2);
//! # cache.dispose();
//! ```
//!
//! ## Error Handling
//!
//! Fallible producers run through `try_get_or_compute`; failures propagate
//! to the caller and are never cached:
//!
//! ```rust
//! use rayo::RayoCache;
//!
//! let cache: RayoCache<i32> = RayoCache::new();
//! let result: Result<i32, String> =
//!     cache.try_get_or_compute("quota", |_| Err("upstream down".to_string()));
//! assert!(result.is_err());
//!
//! // The failure was not cached: this call runs the producer again.
//! let result: Result<i32, String> = cache.try_get_or_compute("quota", |_| Ok(42));
//! assert_eq!(result, Ok(42));
//! # cache.dispose();
//! ```
//!
//! ## Async
//!
//! ```rust,no_run
//! use rayo::RayoCache;
//!
//! # async fn demo() {
//! let cache: RayoCache<String> = RayoCache::new();
//! let value = cache
//!     .get_or_compute_async("profile:42", || async {
//!         // e.g. a database round-trip
//!         "profile".to_string()
//!     })
//!     .await;
//! # }
//! ```

pub mod global;

pub use rayo_core::{
    derive_call_site_key, ByteSized, CacheConfig, CacheEntry, CacheError, EvictionReason,
    EvictionStrategy, Nuances, RayoCache, SizeMode, SizeProbe, StatisticsSnapshot, TopHeavyEntry,
    TopSlowQuery, ValueSizer,
};

pub use global::GlobalCacheCell;

/// Derives a cache key from the call site: the enclosing function's path
/// plus the source file it lives in.
///
/// The same call site always produces the same key, across runs and
/// processes built from the same sources; different functions or files
/// produce different keys. Two invocations inside the *same* function
/// share a key, and moving a file changes every key derived in it - use
/// explicit keys where that matters.
///
/// # Examples
///
/// ```
/// use rayo::{auto_key, RayoCache};
///
/// let cache: RayoCache<u64> = RayoCache::new();
///
/// fn slow_count(cache: &RayoCache<u64>) -> u64 {
///     cache.get_or_compute(&auto_key!(), || 40 + 2)
/// }
///
/// assert_eq!(slow_count(&cache), 42);
/// assert_eq!(slow_count(&cache), 42);
/// # cache.dispose();
/// ```
#[macro_export]
macro_rules! auto_key {
    () => {{
        fn __rayo_anchor() {}
        fn __rayo_name_of<F>(_: F) -> &'static str {
            ::core::any::type_name::<F>()
        }
        let __full = __rayo_name_of(__rayo_anchor);
        $crate::derive_call_site_key(
            __full.trim_end_matches("::__rayo_anchor"),
            ::core::file!(),
        )
    }};
}
