use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use rayo_core::{CacheConfig, RayoCache};

fn cache_with_stats() -> Arc<RayoCache<String>> {
    let cache = RayoCache::with_config(CacheConfig {
        cleanup_interval: Duration::from_millis(50),
        ..CacheConfig::default()
    })
    .unwrap();
    cache.initialize_statistics();
    Arc::new(cache)
}

#[test]
fn test_single_flight_under_contention() {
    let cache = cache_with_stats();
    let producer_runs = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(100));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let producer_runs = Arc::clone(&producer_runs);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_compute_with_ttl("k", 60_000, || {
                    producer_runs.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(200));
                    "produced".to_string()
                })
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "produced");
    }

    assert_eq!(producer_runs.load(Ordering::SeqCst), 1);
    let stats = cache.statistics().unwrap();
    assert_eq!(stats.miss_count, 1);
    assert_eq!(stats.hit_count, 99);
    assert_eq!(stats.total_operations(), 100);
}

#[test]
fn test_distinct_keys_compute_independently() {
    let cache = cache_with_stats();
    let producer_runs = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let producer_runs = Arc::clone(&producer_runs);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_compute(&format!("key-{i}"), || {
                    producer_runs.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(50));
                    format!("value-{i}")
                })
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), format!("value-{i}"));
    }
    // Every key misses once; nothing coalesces across keys.
    assert_eq!(producer_runs.load(Ordering::SeqCst), 8);
}

#[test]
fn test_producer_may_use_other_keys() {
    let cache = cache_with_stats();

    let inner = Arc::clone(&cache);
    let value = cache.get_or_compute("outer", move || {
        let dependency = inner.get_or_compute("inner", || "dep".to_string());
        format!("outer-of-{dependency}")
    });

    assert_eq!(value, "outer-of-dep");
    assert!(cache.contains("inner"));
}

#[test]
fn test_failure_releases_lock_for_next_caller() {
    let cache = cache_with_stats();
    let producer_runs = Arc::new(AtomicUsize::new(0));

    let runs = Arc::clone(&producer_runs);
    let result: Result<String, String> = cache.try_get_or_compute("k", |_| {
        runs.fetch_add(1, Ordering::SeqCst);
        Err("first failure".to_string())
    });
    assert!(result.is_err());

    // The key is still absent and its lock free: the producer runs again.
    let runs = Arc::clone(&producer_runs);
    let result: Result<String, String> = cache.try_get_or_compute("k", |_| {
        runs.fetch_add(1, Ordering::SeqCst);
        Ok("recovered".to_string())
    });
    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(producer_runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_concurrent_failures_serialize_and_all_retry() {
    let cache = cache_with_stats();
    let producer_runs = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let producer_runs = Arc::clone(&producer_runs);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.try_get_or_compute("k", |_| {
                    producer_runs.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(100));
                    Err::<String, _>("down".to_string())
                })
            })
        })
        .collect();

    let failures = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(Result::is_err)
        .count();

    // Failures are not cached, so each serialized caller retries the
    // producer; all of them fail, but never two at once.
    assert_eq!(failures, 4);
    assert_eq!(producer_runs.load(Ordering::SeqCst), 4);
    assert!(!cache.contains("k"));
}

#[test]
fn test_hit_after_insert_is_lock_free_path() {
    let cache = cache_with_stats();
    cache.get_or_compute("k", || "v".to_string());

    // Drain the idle slot, then verify hits never create one.
    thread::sleep(Duration::from_millis(150));
    assert_eq!(cache.lock_count(), 0);
    for _ in 0..10 {
        assert_eq!(cache.get_or_compute("k", || unreachable!()), "v");
    }
    assert_eq!(cache.lock_count(), 0);
}
