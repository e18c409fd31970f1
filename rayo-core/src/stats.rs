use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;

/// One record in the slowest-producers collection.
///
/// Repeated measurements for the same key merge: `worst_ms` and `best_ms`
/// take the extremes, `occurrences` counts runs, and `avg_ms` is a
/// running-weighted average (`avg = (avg * n + sample) / (n + 1)`), not a
/// mean over a fixed window.
#[derive(Clone, Debug)]
pub struct TopSlowQuery {
    pub cache_key: String,
    pub worst_ms: f64,
    pub best_ms: f64,
    pub avg_ms: f64,
    pub occurrences: u64,
}

/// One record in the heaviest-entries collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopHeavyEntry {
    pub cache_key: String,
    pub size_bytes: u64,
}

#[derive(Clone, Copy, Debug)]
struct SlowRecord {
    worst_ms: f64,
    best_ms: f64,
    avg_ms: f64,
    occurrences: u64,
}

/// Bounded collection of the N slowest producers, keyed by cache key.
struct TopSlowQueries {
    capacity: usize,
    records: HashMap<String, SlowRecord>,
}

impl TopSlowQueries {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: HashMap::new(),
        }
    }

    fn record(&mut self, key: &str, elapsed_ms: f64) {
        if self.capacity == 0 {
            return;
        }
        match self.records.get_mut(key) {
            Some(record) => {
                record.worst_ms = record.worst_ms.max(elapsed_ms);
                record.best_ms = record.best_ms.min(elapsed_ms);
                record.avg_ms = (record.avg_ms * record.occurrences as f64 + elapsed_ms)
                    / (record.occurrences + 1) as f64;
                record.occurrences += 1;
            }
            None => {
                self.records.insert(
                    key.to_string(),
                    SlowRecord {
                        worst_ms: elapsed_ms,
                        best_ms: elapsed_ms,
                        avg_ms: elapsed_ms,
                        occurrences: 1,
                    },
                );
            }
        }
        while self.records.len() > self.capacity {
            // Drop whatever sorts last: smallest worst, larger key on ties.
            let victim = self
                .records
                .iter()
                .min_by(|(key_a, a), (key_b, b)| {
                    a.worst_ms
                        .partial_cmp(&b.worst_ms)
                        .unwrap_or(CmpOrdering::Equal)
                        .then_with(|| key_b.cmp(key_a))
                })
                .map(|(key, _)| key.clone());
            match victim {
                Some(key) => self.records.remove(&key),
                None => break,
            };
        }
    }

    fn snapshot(&self) -> Vec<TopSlowQuery> {
        let mut out: Vec<TopSlowQuery> = self
            .records
            .iter()
            .map(|(key, record)| TopSlowQuery {
                cache_key: key.clone(),
                worst_ms: record.worst_ms,
                best_ms: record.best_ms,
                avg_ms: record.avg_ms,
                occurrences: record.occurrences,
            })
            .collect();
        out.sort_by(|a, b| {
            b.worst_ms
                .partial_cmp(&a.worst_ms)
                .unwrap_or(CmpOrdering::Equal)
                .then_with(|| a.cache_key.cmp(&b.cache_key))
        });
        out
    }

    fn clear(&mut self) {
        self.records.clear();
    }
}

/// Bounded collection of the N heaviest entries, keyed by cache key.
struct TopHeavyEntries {
    capacity: usize,
    records: HashMap<String, u64>,
}

impl TopHeavyEntries {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: HashMap::new(),
        }
    }

    fn record(&mut self, key: &str, size_bytes: u64) {
        if self.capacity == 0 {
            return;
        }
        self.records.insert(key.to_string(), size_bytes);
        while self.records.len() > self.capacity {
            let victim = self
                .records
                .iter()
                .min_by(|(key_a, a), (key_b, b)| a.cmp(b).then_with(|| key_b.cmp(key_a)))
                .map(|(key, _)| key.clone());
            match victim {
                Some(key) => self.records.remove(&key),
                None => break,
            };
        }
    }

    fn snapshot(&self) -> Vec<TopHeavyEntry> {
        let mut out: Vec<TopHeavyEntry> = self
            .records
            .iter()
            .map(|(key, size)| TopHeavyEntry {
                cache_key: key.clone(),
                size_bytes: *size,
            })
            .collect();
        out.sort_by(|a, b| {
            b.size_bytes
                .cmp(&a.size_bytes)
                .then_with(|| a.cache_key.cmp(&b.cache_key))
        });
        out
    }

    fn clear(&mut self) {
        self.records.clear();
    }
}

/// Hit/miss/eviction counters plus the bounded top-N collections.
///
/// Counters are atomic with `Relaxed` ordering, the cheapest thing that is
/// still correct for monotonic event counts; cross-counter snapshots are
/// eventually consistent, not transactional. The top-N collections sit
/// behind short-lived mutexes that are only touched on the miss path.
///
/// The engine creates this lazily: until
/// [`initialize_statistics`](crate::RayoCache::initialize_statistics) runs
/// (or the config enables statistics), the fast path pays a single branch
/// and no counter is updated.
#[derive(Debug)]
pub struct CacheStatistics {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    top_slowest: Mutex<TopSlowQueries>,
    top_heaviest: Mutex<TopHeavyEntries>,
}

impl std::fmt::Debug for TopSlowQueries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopSlowQueries")
            .field("capacity", &self.capacity)
            .field("len", &self.records.len())
            .finish()
    }
}

impl std::fmt::Debug for TopHeavyEntries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopHeavyEntries")
            .field("capacity", &self.capacity)
            .field("len", &self.records.len())
            .finish()
    }
}

impl CacheStatistics {
    pub(crate) fn new(max_top_slowest: u32, max_top_heaviest: u32) -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            top_slowest: Mutex::new(TopSlowQueries::new(max_top_slowest as usize)),
            top_heaviest: Mutex::new(TopHeavyEntries::new(max_top_heaviest as usize)),
        }
    }

    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_producer_time(&self, key: &str, elapsed: Duration) {
        let elapsed_ms = elapsed.as_secs_f64() * 1_000.0;
        self.top_slowest.lock().record(key, elapsed_ms);
    }

    pub(crate) fn record_entry_size(&self, key: &str, size_bytes: u64) {
        self.top_heaviest.lock().record(key, size_bytes);
    }

    pub(crate) fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub(crate) fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub(crate) fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Zeroes the monotonic counters and clears the top-N collections.
    /// Entry count and approximate bytes are derived from the live store
    /// and are untouched by a reset.
    pub(crate) fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.top_slowest.lock().clear();
        self.top_heaviest.lock().clear();
    }

    pub(crate) fn snapshot(&self, entry_count: u64, approximate_bytes: u64) -> StatisticsSnapshot {
        StatisticsSnapshot {
            hit_count: self.hits(),
            miss_count: self.misses(),
            eviction_count: self.evictions(),
            entry_count,
            approximate_bytes,
            top_slowest: self.top_slowest.lock().snapshot(),
            top_heaviest: self.top_heaviest.lock().snapshot(),
        }
    }
}

/// Per-key size ledger: the number the capacity enforcer plans with.
///
/// Kept separate from the user-facing statistics so capacity enforcement
/// works whether or not statistics were ever initialized. The total is the
/// sum of all live entries' recorded sizes.
#[derive(Debug, Default)]
pub(crate) struct SizeLedger {
    sizes: DashMap<String, u64>,
    total: AtomicU64,
}

impl SizeLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, key: &str, size_bytes: u64) {
        if let Some(old) = self.sizes.insert(key.to_string(), size_bytes) {
            self.total.fetch_sub(old, Ordering::Relaxed);
        }
        self.total.fetch_add(size_bytes, Ordering::Relaxed);
    }

    pub(crate) fn remove(&self, key: &str) {
        if let Some((_, size)) = self.sizes.remove(key) {
            self.total.fetch_sub(size, Ordering::Relaxed);
        }
    }

    pub(crate) fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self) -> Vec<(String, u64)> {
        self.sizes
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

/// Read-only view of the cache's statistics at one instant.
///
/// Individual counters are read atomically; the snapshot as a whole is
/// eventually consistent (a concurrent operation may be half-reflected).
///
/// # Examples
///
/// ```
/// use rayo_core::RayoCache;
///
/// let cache: RayoCache<String> = RayoCache::new();
/// assert!(cache.statistics().is_none());
///
/// cache.initialize_statistics();
/// cache.get_or_compute("greeting", || "hola".to_string());
///
/// let stats = cache.statistics().unwrap();
/// assert_eq!(stats.miss_count, 1);
/// assert_eq!(stats.total_operations(), 1);
/// # cache.dispose();
/// ```
#[derive(Clone, Debug)]
pub struct StatisticsSnapshot {
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
    pub entry_count: u64,
    pub approximate_bytes: u64,
    pub top_slowest: Vec<TopSlowQuery>,
    pub top_heaviest: Vec<TopHeavyEntry>,
}

impl StatisticsSnapshot {
    /// Hits plus misses.
    pub fn total_operations(&self) -> u64 {
        self.hit_count + self.miss_count
    }

    /// Fraction of operations served from cache; 0 when nothing ran yet.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.total_operations();
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}
