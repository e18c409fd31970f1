use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rayo_core::{CacheConfig, RayoCache};

fn cache_with_stats() -> RayoCache<String> {
    let cache = RayoCache::with_config(CacheConfig {
        cleanup_interval: Duration::from_millis(50),
        ..CacheConfig::default()
    })
    .unwrap();
    cache.initialize_statistics();
    cache
}

#[test]
fn test_entry_expires_and_recomputes() {
    let cache = cache_with_stats();

    assert_eq!(
        cache.get_or_compute_with_ttl("k", 50, || "v".to_string()),
        "v"
    );
    thread::sleep(Duration::from_millis(150));
    assert_eq!(
        cache.get_or_compute_with_ttl("k", 50, || "w".to_string()),
        "w"
    );

    let stats = cache.statistics().unwrap();
    assert_eq!(stats.miss_count, 2);
    assert!(stats.eviction_count >= 1);
}

#[test]
fn test_hit_within_retention_window() {
    let cache = cache_with_stats();
    cache.get_or_compute_with_ttl("k", 30_000, || "x".to_string());
    assert_eq!(
        cache.get_or_compute_with_ttl("k", 30_000, || "y".to_string()),
        "x"
    );

    let stats = cache.statistics().unwrap();
    assert_eq!(stats.miss_count, 1);
    assert_eq!(stats.hit_count, 1);
    assert_eq!(stats.entry_count, 1);
}

#[test]
fn test_producer_zero_retention_disables_caching() {
    let cache = cache_with_stats();
    let producer_runs = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let runs = Arc::clone(&producer_runs);
        let value = cache.get_or_compute_nuanced("k", move |nuances| {
            runs.fetch_add(1, Ordering::SeqCst);
            nuances.skip_caching();
            "fresh".to_string()
        });
        assert_eq!(value, "fresh");
    }

    // Every call re-invoked the producer; nothing was ever inserted.
    assert_eq!(producer_runs.load(Ordering::SeqCst), 3);
    assert_eq!(cache.entry_count(), 0);
    assert_eq!(cache.statistics().unwrap().miss_count, 3);
}

#[test]
fn test_producer_retention_outlives_call_ttl() {
    let cache = cache_with_stats();

    // The call asks for 50ms but the producer insists on a minute.
    cache.try_get_or_compute_with_ttl("k", 50, |nuances| {
        nuances.set_cache_retention_ms(60_000);
        Ok::<_, std::convert::Infallible>("durable".to_string())
    })
    .unwrap();

    thread::sleep(Duration::from_millis(120));
    assert!(cache.contains("k"));
}

#[test]
fn test_call_ttl_overrides_default() {
    let cache = cache_with_stats();
    cache.get_or_compute_with_ttl("short", 50, || "v".to_string());
    cache.get_or_compute("long", || "v".to_string());

    thread::sleep(Duration::from_millis(120));
    assert!(!cache.contains("short"));
    assert!(cache.contains("long"));
}

#[test]
fn test_force_update_restarts_retention() {
    let cache = cache_with_stats();
    cache.get_or_compute_with_ttl("k", 50, || "old".to_string());
    cache.force_update("k", 60_000, || "new".to_string());

    thread::sleep(Duration::from_millis(120));
    // The original 50ms deadline died with the replaced entry.
    assert_eq!(cache.get_or_compute("k", || unreachable!()), "new");
}

#[test]
fn test_force_update_then_get_does_not_run_producer() {
    let cache = cache_with_stats();
    cache.force_update("k", 30_000, || "forced".to_string());

    let producer_runs = Arc::new(AtomicUsize::new(0));
    let runs = Arc::clone(&producer_runs);
    let value = cache.get_or_compute("k", move || {
        runs.fetch_add(1, Ordering::SeqCst);
        "other".to_string()
    });

    assert_eq!(value, "forced");
    assert_eq!(producer_runs.load(Ordering::SeqCst), 0);
}
