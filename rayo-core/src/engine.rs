use std::convert::Infallible;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::debug;

use crate::capacity::CapacityEnforcer;
use crate::cache_entry::EvictionReason;
use crate::entry_store::EntryStore;
use crate::keyed_lock::{spawn_sweeper, KeyedLockRegistry, LockHandle, SweeperHandle};
use crate::stats::{CacheStatistics, SizeLedger, StatisticsSnapshot};
use crate::{ByteSized, CacheConfig, CacheError, Nuances, ValueSizer};

/// A thread-safe, in-process key-to-value cache with single-flight
/// execution.
///
/// Given a key and a producer, concurrent callers that miss the cache
/// cause the producer to run exactly once; every caller receives the value
/// that one run produced (or sees its one failure). On top of
/// single-flight the cache provides per-entry TTL expiration, an optional
/// byte-capacity bound with deterministic eviction, optional statistics,
/// and producer-adjustable retention via [`Nuances`].
///
/// # Features
///
/// - **Single-flight misses**: a per-key binary lock serializes producer
///   runs; waiters pick the value up from the store instead of recomputing
/// - **Fast-path hits**: a hit is one concurrent-map probe, one clone, and
///   (when statistics are on) one relaxed counter increment - no lock
/// - **TTL expiration**: absolute per-entry deadlines, observed lazily on
///   the next read
/// - **Capacity enforcement**: approximate byte accounting with
///   `SmallestFirst`/`LargestFirst` eviction
/// - **Sync and async**: every operation has a blocking form and a
///   suspending `_async` twin; they share one code path and differ only in
///   how the keyed lock is acquired and the producer awaited
///
/// # Thread Safety
///
/// All operations take `&self` and may be called from any thread or task
/// concurrently. The blocking forms park the calling thread on the keyed
/// lock and must not be used from inside an async runtime; use the
/// `_async` forms there.
///
/// # Reentrancy
///
/// A producer must not call back into the cache for the *same* key - the
/// keyed lock is not reentrant and doing so deadlocks. Producers may
/// freely use the cache for other keys.
///
/// # Examples
///
/// ```
/// use rayo_core::RayoCache;
///
/// let cache: RayoCache<String> = RayoCache::new();
///
/// let value = cache.get_or_compute("motd", || "hola".to_string());
/// assert_eq!(value, "hola");
///
/// // Second call is a hit; the producer does not run.
/// let value = cache.get_or_compute("motd", || unreachable!());
/// assert_eq!(value, "hola");
/// # cache.dispose();
/// ```
///
/// Producers that decide at runtime how long their result should live use
/// the nuanced form:
///
/// ```
/// use rayo_core::RayoCache;
///
/// let cache: RayoCache<Vec<u8>> = RayoCache::new();
/// let payload = cache.get_or_compute_nuanced("blob", |nuances| {
///     let bytes = vec![0u8; 16];
///     if bytes.is_empty() {
///         nuances.skip_caching();
///     } else {
///         nuances.set_cache_retention_ms(5_000);
///     }
///     bytes
/// });
/// assert_eq!(payload.len(), 16);
/// # cache.dispose();
/// ```
pub struct RayoCache<T: Clone + Send + Sync + 'static> {
    config: CacheConfig,
    store: Arc<EntryStore<T>>,
    locks: Arc<KeyedLockRegistry>,
    ledger: Arc<SizeLedger>,
    statistics: Arc<OnceCell<CacheStatistics>>,
    sizer: ValueSizer,
    enforcer: Option<CapacityEnforcer>,
    sweeper: Mutex<Option<SweeperHandle>>,
    disposed: AtomicBool,
}

fn unwrap_infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

impl<T: Clone + Send + Sync + 'static> RayoCache<T> {
    /// Creates a cache with [`CacheConfig::default`].
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default()).expect("default configuration is valid")
    }

    /// Creates a cache with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfiguration`] when the configuration
    /// fails validation; see [`CacheConfig::validate`].
    pub fn with_config(config: CacheConfig) -> Result<Self, CacheError> {
        config.validate()?;

        let ledger = Arc::new(SizeLedger::new());
        let statistics = Arc::new(OnceCell::new());
        if config.enable_statistics {
            let _ = statistics.set(CacheStatistics::new(
                config.max_top_slowest,
                config.max_top_heaviest,
            ));
        }

        // The one place store evictions and statistics are glued together:
        // every removal, whatever its reason, flows through this listener,
        // so manual removes and lazy expirations cannot double-count.
        let listener_ledger = Arc::clone(&ledger);
        let listener_statistics: Arc<OnceCell<CacheStatistics>> = Arc::clone(&statistics);
        let store = Arc::new(EntryStore::new(Box::new(move |key, _size, _reason| {
            listener_ledger.remove(key);
            if let Some(stats) = listener_statistics.get() {
                stats.record_eviction();
            }
        })));

        let locks = Arc::new(KeyedLockRegistry::new());
        let sweeper = spawn_sweeper(Arc::clone(&locks), config.cleanup_interval);
        let enforcer = config
            .max_cache_size_bytes
            .map(|limit| CapacityEnforcer::new(limit, config.eviction_strategy));
        let sizer = ValueSizer::new(config.size_mode);

        Ok(Self {
            config,
            store,
            locks,
            ledger,
            statistics,
            sizer,
            enforcer,
            sweeper: Mutex::new(Some(sweeper)),
            disposed: AtomicBool::new(false),
        })
    }

    fn ensure_live(&self) {
        assert!(
            !self.disposed.load(Ordering::Acquire),
            "RayoCache used after dispose()"
        );
    }

    /// Non-mutating probe: is there a live (non-expired) entry for `key`?
    /// Never counts as a hit or a miss.
    pub fn contains(&self, key: &str) -> bool {
        self.ensure_live();
        self.store.contains(key)
    }

    /// Removes the entry for `key`, if any. A removed entry is reported to
    /// the eviction callback with reason `Manual`; removing an absent key
    /// is a no-op that takes no lock.
    pub fn remove(&self, key: &str) {
        self.ensure_live();
        if !self.store.contains(key) {
            return;
        }
        let _guard = self.locks.acquire(key);
        self.store.remove(key, EvictionReason::Manual);
    }

    /// Suspending form of [`remove`](Self::remove).
    pub async fn remove_async(&self, key: &str) {
        self.ensure_live();
        if !self.store.contains(key) {
            return;
        }
        let _guard = self.locks.acquire_async(key).await;
        self.store.remove(key, EvictionReason::Manual);
    }

    /// Turns statistics collection on. Idempotent; a no-op when the
    /// configuration already enabled statistics.
    pub fn initialize_statistics(&self) {
        self.ensure_live();
        let _ = self.statistics.set(CacheStatistics::new(
            self.config.max_top_slowest,
            self.config.max_top_heaviest,
        ));
    }

    /// A snapshot of the statistics, or `None` when statistics were never
    /// initialized. Still readable after disposal, where it reports the
    /// drained cache (entry count and bytes at zero, disposal evictions
    /// counted).
    pub fn statistics(&self) -> Option<StatisticsSnapshot> {
        self.statistics
            .get()
            .map(|stats| stats.snapshot(self.store.len() as u64, self.ledger.total()))
    }

    /// Zeroes hit/miss/eviction counters and clears the top-N collections.
    /// Entry count and approximate bytes reflect the live store and are
    /// unaffected.
    pub fn reset_statistics(&self) {
        self.ensure_live();
        if let Some(stats) = self.statistics.get() {
            stats.reset();
        }
    }

    /// Number of live entries. Still readable after disposal (always 0
    /// there).
    pub fn entry_count(&self) -> usize {
        self.store.len()
    }

    /// Sum of the sizer's estimates over all live entries. Reads 0 when
    /// sizing is disabled (no capacity limit and no heavy-entry tracking).
    pub fn approximate_bytes(&self) -> u64 {
        self.ledger.total()
    }

    /// Number of keyed-lock slots currently tracked, for observation and
    /// tests. Idle slots linger here until the sweeper's next pass; after
    /// disposal this reads 0.
    pub fn lock_count(&self) -> usize {
        self.locks.count()
    }

    /// Releases the cache: stops the keyed-lock sweeper, evicts every
    /// entry (firing the eviction callback for each, driving entry count
    /// and approximate bytes to zero), and drops all lock slots.
    ///
    /// Idempotent - a second call is a no-op. Any *other* operation after
    /// disposal panics.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(mut sweeper) = self.sweeper.lock().take() {
            sweeper.stop();
        }
        self.store.clear(EvictionReason::Manual);
        self.locks.clear();
        debug!("cache disposed");
    }

    fn record_hit(&self) {
        if let Some(stats) = self.statistics.get() {
            stats.record_hit();
        }
    }

    fn record_miss(&self) {
        if let Some(stats) = self.statistics.get() {
            stats.record_miss();
        }
    }

    fn enforce_capacity(&self) {
        if let Some(enforcer) = &self.enforcer {
            enforcer.enforce(&self.store, &self.ledger);
        }
    }
}

impl<T: Clone + Send + Sync + ByteSized + 'static> RayoCache<T> {
    /// Returns the cached value for `key`, or runs `producer` to fill it.
    ///
    /// On a hit the producer does not run. On a miss, concurrent callers
    /// for the same key serialize: exactly one runs the producer, the rest
    /// pick up its result. The entry lives for the cache's
    /// `default_retention_ms`.
    ///
    /// Must not be called from inside an async runtime; use
    /// [`get_or_compute_async`](Self::get_or_compute_async) there.
    pub fn get_or_compute<F>(&self, key: &str, producer: F) -> T
    where
        F: FnOnce() -> T,
    {
        unwrap_infallible(self.compute_blocking(key, None, |_| Ok::<_, Infallible>(producer())))
    }

    /// Like [`get_or_compute`](Self::get_or_compute) with an explicit
    /// per-call retention in milliseconds. A producer-set retention still
    /// wins over `ttl_ms`.
    pub fn get_or_compute_with_ttl<F>(&self, key: &str, ttl_ms: i64, producer: F) -> T
    where
        F: FnOnce() -> T,
    {
        unwrap_infallible(
            self.compute_blocking(key, Some(ttl_ms), |_| Ok::<_, Infallible>(producer())),
        )
    }

    /// Like [`get_or_compute`](Self::get_or_compute), but the producer
    /// receives the per-call [`Nuances`] and may adjust how its result is
    /// retained - including [`Nuances::skip_caching`] to return a value
    /// without inserting it.
    pub fn get_or_compute_nuanced<F>(&self, key: &str, producer: F) -> T
    where
        F: FnOnce(&Nuances) -> T,
    {
        unwrap_infallible(
            self.compute_blocking(key, None, |nuances| Ok::<_, Infallible>(producer(nuances))),
        )
    }

    /// Fallible form: a producer `Err` propagates to the caller, releases
    /// the keyed lock, and caches nothing - the next call for the key runs
    /// the producer again.
    pub fn try_get_or_compute<F, E>(&self, key: &str, producer: F) -> Result<T, E>
    where
        F: FnOnce(&Nuances) -> Result<T, E>,
    {
        self.compute_blocking(key, None, producer)
    }

    /// Fallible form with an explicit per-call retention.
    pub fn try_get_or_compute_with_ttl<F, E>(
        &self,
        key: &str,
        ttl_ms: i64,
        producer: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&Nuances) -> Result<T, E>,
    {
        self.compute_blocking(key, Some(ttl_ms), producer)
    }

    /// Runs `producer` and stores its result under `key` unconditionally,
    /// replacing any existing entry and retaining the new one for
    /// `ttl_ms`. Never counts as a hit or a miss; still subject to
    /// capacity enforcement.
    pub fn force_update<F>(&self, key: &str, ttl_ms: i64, producer: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.ensure_live();
        let guard = self.locks.acquire(key);
        let nuances = Nuances::new();
        let started = Instant::now();
        let value = producer();
        let produced_in = started.elapsed();
        self.commit(key, value, &nuances, Some(ttl_ms), produced_in, guard)
    }

    /// Suspending twin of [`get_or_compute`](Self::get_or_compute).
    pub async fn get_or_compute_async<F, Fut>(&self, key: &str, producer: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        unwrap_infallible(
            self.compute_suspending(key, None, |_| async move {
                Ok::<_, Infallible>(producer().await)
            })
            .await,
        )
    }

    /// Suspending twin of
    /// [`get_or_compute_with_ttl`](Self::get_or_compute_with_ttl).
    pub async fn get_or_compute_with_ttl_async<F, Fut>(
        &self,
        key: &str,
        ttl_ms: i64,
        producer: F,
    ) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        unwrap_infallible(
            self.compute_suspending(key, Some(ttl_ms), |_| async move {
                Ok::<_, Infallible>(producer().await)
            })
            .await,
        )
    }

    /// Suspending twin of
    /// [`get_or_compute_nuanced`](Self::get_or_compute_nuanced). The
    /// producer receives an `Arc<Nuances>` its future may hold across
    /// awaits; the engine reads the retention once the future completes.
    pub async fn get_or_compute_nuanced_async<F, Fut>(&self, key: &str, producer: F) -> T
    where
        F: FnOnce(Arc<Nuances>) -> Fut,
        Fut: Future<Output = T>,
    {
        unwrap_infallible(
            self.compute_suspending(key, None, |nuances| async move {
                Ok::<_, Infallible>(producer(nuances).await)
            })
            .await,
        )
    }

    /// Suspending twin of
    /// [`try_get_or_compute`](Self::try_get_or_compute).
    ///
    /// Cancellation counts as failure: dropping the returned future while
    /// the producer runs releases the keyed lock without inserting, and
    /// the next caller retries the miss path.
    pub async fn try_get_or_compute_async<F, Fut, E>(&self, key: &str, producer: F) -> Result<T, E>
    where
        F: FnOnce(Arc<Nuances>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.compute_suspending(key, None, producer).await
    }

    /// Suspending twin of
    /// [`try_get_or_compute_with_ttl`](Self::try_get_or_compute_with_ttl).
    pub async fn try_get_or_compute_with_ttl_async<F, Fut, E>(
        &self,
        key: &str,
        ttl_ms: i64,
        producer: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Arc<Nuances>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.compute_suspending(key, Some(ttl_ms), producer).await
    }

    /// Suspending twin of [`force_update`](Self::force_update).
    pub async fn force_update_async<F, Fut>(&self, key: &str, ttl_ms: i64, producer: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.ensure_live();
        let guard = self.locks.acquire_async(key).await;
        let nuances = Nuances::new();
        let started = Instant::now();
        let value = producer().await;
        let produced_in = started.elapsed();
        self.commit(key, value, &nuances, Some(ttl_ms), produced_in, guard)
    }

    /// The one blocking miss path all sync operations funnel into.
    fn compute_blocking<F, E>(
        &self,
        key: &str,
        ttl_override: Option<i64>,
        producer: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&Nuances) -> Result<T, E>,
    {
        self.ensure_live();
        if let Some(value) = self.store.try_get(key) {
            self.record_hit();
            return Ok(value);
        }

        let guard = self.locks.acquire(key);

        // Another caller may have produced while we waited on the lock.
        if let Some(value) = self.store.try_get(key) {
            self.record_hit();
            return Ok(value);
        }
        self.record_miss();

        let nuances = Nuances::new();
        let started = Instant::now();
        let value = producer(&nuances)?;
        let produced_in = started.elapsed();
        Ok(self.commit(key, value, &nuances, ttl_override, produced_in, guard))
    }

    /// The one suspending miss path all async operations funnel into.
    async fn compute_suspending<F, Fut, E>(
        &self,
        key: &str,
        ttl_override: Option<i64>,
        producer: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Arc<Nuances>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.ensure_live();
        if let Some(value) = self.store.try_get(key) {
            self.record_hit();
            return Ok(value);
        }

        let guard = self.locks.acquire_async(key).await;

        if let Some(value) = self.store.try_get(key) {
            self.record_hit();
            return Ok(value);
        }
        self.record_miss();

        let nuances = Arc::new(Nuances::new());
        let started = Instant::now();
        let value = producer(Arc::clone(&nuances)).await?;
        let produced_in = started.elapsed();
        Ok(self.commit(key, value, &nuances, ttl_override, produced_in, guard))
    }

    /// Post-producer tail shared by every insert path: resolve the
    /// effective retention, size the value, insert, update statistics,
    /// release the keyed lock, and only then run capacity enforcement.
    fn commit(
        &self,
        key: &str,
        value: T,
        nuances: &Nuances,
        ttl_override: Option<i64>,
        produced_in: Duration,
        guard: LockHandle<'_>,
    ) -> T {
        let retention_ms = nuances
            .cache_retention_ms()
            .or(ttl_override)
            .unwrap_or(self.config.default_retention_ms)
            .max(0);
        if retention_ms == 0 {
            drop(guard);
            return value;
        }

        let sizing = self.config.sizing_enabled();
        let size_bytes = if sizing { self.sizer.size_of(&value) } else { 0 };
        let expires_at = Instant::now() + Duration::from_millis(retention_ms as u64);
        self.store
            .insert(key, value.clone(), expires_at, size_bytes, produced_in);
        if sizing {
            self.ledger.add(key, size_bytes);
        }
        if let Some(stats) = self.statistics.get() {
            stats.record_producer_time(key, produced_in);
            if sizing {
                stats.record_entry_size(key, size_bytes);
            }
        }

        drop(guard);
        self.enforce_capacity();
        value
    }
}

impl<T: Clone + Send + Sync + 'static> Default for RayoCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for RayoCache<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}
