use std::thread;
use std::time::Duration;

use rayo_core::{CacheConfig, RayoCache};

fn fast_sweep_cache() -> RayoCache<String> {
    let cache = RayoCache::with_config(CacheConfig {
        cleanup_interval: Duration::from_millis(50),
        ..CacheConfig::default()
    })
    .unwrap();
    cache.initialize_statistics();
    cache
}

#[test]
fn test_dispose_drains_everything() {
    let cache = fast_sweep_cache();
    for i in 0..5 {
        cache.get_or_compute(&format!("k{i}"), || "v".to_string());
    }
    let before = cache.statistics().unwrap();
    assert_eq!(before.entry_count, 5);

    cache.dispose();

    assert_eq!(cache.entry_count(), 0);
    assert_eq!(cache.lock_count(), 0);
    assert_eq!(cache.approximate_bytes(), 0);

    // Each drained entry fired its eviction callback.
    let after = cache.statistics().unwrap();
    assert_eq!(after.entry_count, 0);
    assert_eq!(after.eviction_count, before.eviction_count + 5);
}

#[test]
fn test_dispose_twice_is_noop() {
    let cache = fast_sweep_cache();
    cache.get_or_compute("k", || "v".to_string());
    cache.dispose();
    let evictions = cache.statistics().unwrap().eviction_count;
    cache.dispose();
    assert_eq!(cache.statistics().unwrap().eviction_count, evictions);
}

#[test]
#[should_panic(expected = "used after dispose")]
fn test_get_after_dispose_panics() {
    let cache = fast_sweep_cache();
    cache.dispose();
    let _ = cache.get_or_compute("k", || "v".to_string());
}

#[test]
#[should_panic(expected = "used after dispose")]
fn test_remove_after_dispose_panics() {
    let cache = fast_sweep_cache();
    cache.dispose();
    cache.remove("k");
}

#[test]
fn test_drop_disposes() {
    let cache = fast_sweep_cache();
    cache.get_or_compute("k", || "v".to_string());
    drop(cache);
    // Nothing to assert beyond "drop returns": the sweeper thread was
    // stopped and joined, which would hang here if disposal leaked it.
}

#[test]
fn test_idle_lock_slots_reclaimed_after_quiescence() {
    let cache = fast_sweep_cache();
    for i in 0..10 {
        cache.get_or_compute(&format!("k{i}"), || "v".to_string());
    }
    assert!(cache.lock_count() > 0);

    // Two full sweep intervals with no activity.
    thread::sleep(Duration::from_millis(150));
    assert_eq!(cache.lock_count(), 0);

    // The cache still works afterwards.
    assert_eq!(cache.get_or_compute("k0", || unreachable!()), "v");
    cache.dispose();
}
