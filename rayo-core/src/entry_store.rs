use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::cache_entry::{CacheEntry, EvictionReason};

/// Callback invoked exactly once per removed entry with the key, the size
/// recorded at insertion, and why the entry left. Must be non-blocking and
/// must not call back into the cache for the same key.
pub(crate) type EvictionListener = Box<dyn Fn(&str, u64, EvictionReason) + Send + Sync>;

/// Owns all live [`CacheEntry`] records.
///
/// Backed by a sharded concurrent map: operations on distinct keys
/// interleave freely, operations on the same key serialize on the shard.
/// The keyed lock that the engine holds around producer runs is *in
/// addition* to this; the store's own synchronization is what keeps
/// probe/insert/remove atomic.
///
/// Every successful removal - explicit, expired-on-read, replacement, or
/// capacity - fires the eviction listener exactly once, after the shard
/// lock has been released.
pub(crate) struct EntryStore<T> {
    entries: DashMap<String, CacheEntry<T>>,
    on_evict: EvictionListener,
}

impl<T: Clone> EntryStore<T> {
    pub(crate) fn new(on_evict: EvictionListener) -> Self {
        Self {
            entries: DashMap::new(),
            on_evict,
        }
    }

    /// Returns a clone of the live value for `key`, or `None`.
    ///
    /// An expired entry observed here is removed and reported `Expired`
    /// before `None` is returned.
    pub(crate) fn try_get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }
        // Re-checked under the shard's write lock: only remove the entry if
        // it is still the expired one, not a concurrent replacement.
        if let Some((_, expired)) = self.entries.remove_if(key, |_, entry| entry.is_expired(now)) {
            (self.on_evict)(key, expired.size_bytes, EvictionReason::Expired);
        }
        None
    }

    /// Inserts or replaces the entry for `key`. A replaced entry is
    /// reported `Replaced`.
    pub(crate) fn insert(
        &self,
        key: &str,
        value: T,
        expires_at: Instant,
        size_bytes: u64,
        produced_in: Duration,
    ) {
        let entry = CacheEntry::new(value, expires_at, size_bytes, produced_in);
        if let Some(previous) = self.entries.insert(key.to_string(), entry) {
            (self.on_evict)(key, previous.size_bytes, EvictionReason::Replaced);
        }
    }

    /// Removes `key` if present, reporting it with `reason`. Returns
    /// whether an entry was actually removed.
    pub(crate) fn remove(&self, key: &str, reason: EvictionReason) -> bool {
        match self.entries.remove(key) {
            Some((_, entry)) => {
                (self.on_evict)(key, entry.size_bytes, reason);
                true
            }
            None => false,
        }
    }

    /// Non-mutating probe: present and not yet expired. Leaves expired
    /// entries in place and never touches statistics.
    pub(crate) fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .map_or(false, |entry| !entry.is_expired(now))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Evicts roughly `fraction` of the live entries, reported `Capacity`.
    ///
    /// This is the capacity enforcer's fallback when its ordered pass was
    /// outrun by concurrent inserts; victims are picked at random rather
    /// than by the eviction strategy. Returns how many entries went.
    pub(crate) fn compact(&self, fraction: f64) -> usize {
        let fraction = fraction.clamp(0.0, 1.0);
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        let victims = ((keys.len() as f64) * fraction).ceil() as usize;
        if victims == 0 {
            return 0;
        }
        fastrand::shuffle(&mut keys);
        let mut removed = 0;
        for key in keys.into_iter().take(victims) {
            if self.remove(&key, EvictionReason::Capacity) {
                removed += 1;
            }
        }
        removed
    }

    /// Removes every entry, reporting each with `reason`. Used on
    /// disposal.
    pub(crate) fn clear(&self, reason: EvictionReason) {
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            self.remove(&key, reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Events = Arc<Mutex<Vec<(String, u64, EvictionReason)>>>;

    fn store_with_log<T: Clone>() -> (EntryStore<T>, Events) {
        let events: Events = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&events);
        let store = EntryStore::new(Box::new(move |key, size, reason| {
            log.lock().push((key.to_string(), size, reason));
        }));
        (store, events)
    }

    fn in_one_minute() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[test]
    fn test_insert_and_get() {
        let (store, events) = store_with_log();
        store.insert("k", 7, in_one_minute(), 8, Duration::ZERO);
        assert_eq!(store.try_get("k"), Some(7));
        assert_eq!(store.len(), 1);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_missing_key() {
        let (store, _) = store_with_log::<i32>();
        assert_eq!(store.try_get("nope"), None);
        assert!(!store.contains("nope"));
    }

    #[test]
    fn test_replace_fires_callback() {
        let (store, events) = store_with_log();
        store.insert("k", 1, in_one_minute(), 10, Duration::ZERO);
        store.insert("k", 2, in_one_minute(), 20, Duration::ZERO);

        assert_eq!(store.try_get("k"), Some(2));
        let events = events.lock();
        assert_eq!(
            *events,
            vec![("k".to_string(), 10, EvictionReason::Replaced)]
        );
    }

    #[test]
    fn test_expired_entry_removed_on_read() {
        let (store, events) = store_with_log();
        store.insert("k", 1, Instant::now() - Duration::from_millis(1), 16, Duration::ZERO);

        assert_eq!(store.try_get("k"), None);
        assert_eq!(store.len(), 0);
        assert_eq!(
            *events.lock(),
            vec![("k".to_string(), 16, EvictionReason::Expired)]
        );

        // Already gone: no second callback.
        assert_eq!(store.try_get("k"), None);
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn test_contains_does_not_remove_expired() {
        let (store, events) = store_with_log();
        store.insert("k", 1, Instant::now() - Duration::from_millis(1), 16, Duration::ZERO);

        assert!(!store.contains("k"));
        assert_eq!(store.len(), 1);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_remove_reports_reason() {
        let (store, events) = store_with_log();
        store.insert("k", 1, in_one_minute(), 4, Duration::ZERO);

        assert!(store.remove("k", EvictionReason::Manual));
        assert!(!store.remove("k", EvictionReason::Manual));
        assert_eq!(
            *events.lock(),
            vec![("k".to_string(), 4, EvictionReason::Manual)]
        );
    }

    #[test]
    fn test_compact_fraction() {
        let (store, events) = store_with_log();
        for i in 0..10 {
            store.insert(&format!("k{i}"), i, in_one_minute(), 1, Duration::ZERO);
        }

        let removed = store.compact(0.3);
        assert_eq!(removed, 3);
        assert_eq!(store.len(), 7);
        assert!(events
            .lock()
            .iter()
            .all(|(_, _, reason)| *reason == EvictionReason::Capacity));
    }

    #[test]
    fn test_compact_zero_fraction() {
        let (store, _) = store_with_log();
        store.insert("k", 1, in_one_minute(), 1, Duration::ZERO);
        assert_eq!(store.compact(0.0), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear_reports_every_entry() {
        let (store, events) = store_with_log();
        for i in 0..5 {
            store.insert(&format!("k{i}"), i, in_one_minute(), 2, Duration::ZERO);
        }
        store.clear(EvictionReason::Manual);

        assert_eq!(store.len(), 0);
        assert_eq!(events.lock().len(), 5);
    }
}
