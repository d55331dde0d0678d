// ==============================================
// SIMPLE CACHE CONCURRENCY TESTS (integration)
// ==============================================
//
// Multi-threaded checks of the two lock tiers: container-wide mutual
// exclusion for put/remove/clear, and per-key serialization of
// compute-if-absent. These need real threads and cannot live inline.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::Duration;

use cachestore::SimpleCache;
use cachestore::builder::SimpleCacheBuilder;
use tracing_subscriber::EnvFilter;

/// Routes cache trace events to the test harness; set `RUST_LOG=cachestore=trace`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ==============================================
// Single computation per key (best effort)
// ==============================================
//
// N threads race on one missing key with a slow producer. The first thread to
// take the key lock computes; everyone else either waits on that lock and hits
// the double-check, or arrives after the value is stored.

mod single_computation {
    use super::*;

    #[test]
    fn racing_threads_share_one_value() {
        init_tracing();
        let num_threads = 16;

        for _ in 0..50 {
            let cache: Arc<SimpleCache<&'static str, usize>> = Arc::new(SimpleCache::new());
            let calls = Arc::new(AtomicUsize::new(0));
            let barrier = Arc::new(Barrier::new(num_threads));

            let handles: Vec<_> = (0..num_threads)
                .map(|tid| {
                    let cache = cache.clone();
                    let calls = calls.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        cache.get_or_insert_with("hot", || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(2));
                            tid
                        })
                    })
                })
                .collect();

            let results: Vec<Arc<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

            let stored = cache.get(&"hot").expect("value should be stored");
            let invocations = calls.load(Ordering::SeqCst);
            assert!(invocations >= 1);
            assert!(
                invocations < num_threads,
                "every thread computed ({invocations}); key lock did not serialize"
            );
            if invocations == 1 {
                assert!(results.iter().all(|r| Arc::ptr_eq(r, &stored)));
            }
            assert_eq!(cache.in_flight(), 0);
        }
    }

    #[test]
    fn waiters_do_not_recompute_while_holder_is_busy() {
        init_tracing();
        let cache: Arc<SimpleCache<u32, u32>> = Arc::new(SimpleCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let cache = cache.clone();
            let calls = calls.clone();
            thread::spawn(move || {
                cache.get_or_insert_with(1, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    100
                })
            })
        };
        started_rx.recv().unwrap();

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                thread::spawn(move || {
                    cache.get_or_insert_with(1, || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        200
                    })
                })
            })
            .collect();

        // Give every waiter time to queue on the key lock.
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();

        assert_eq!(*holder.join().unwrap(), 100);
        for waiter in waiters {
            assert_eq!(*waiter.join().unwrap(), 100);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight(), 0);
    }
}

// ==============================================
// Unrelated keys compute in parallel
// ==============================================

mod independent_keys {
    use super::*;

    #[test]
    fn blocked_producer_does_not_block_other_keys() {
        init_tracing();
        let cache: Arc<SimpleCache<&'static str, u32>> = Arc::new(SimpleCache::new());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let slow = {
            let cache = cache.clone();
            thread::spawn(move || {
                cache.get_or_insert_with("slow", || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    1
                })
            })
        };
        started_rx.recv().unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let fast = {
            let cache = cache.clone();
            thread::spawn(move || {
                let value = cache.get_or_insert_with("fast", || 2);
                done_tx.send(*value).unwrap();
            })
        };

        assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)), Ok(2));
        assert_eq!(cache.in_flight(), 1);

        release_tx.send(()).unwrap();
        assert_eq!(*slow.join().unwrap(), 1);
        fast.join().unwrap();
        assert_eq!(cache.in_flight(), 0);
    }

    #[test]
    fn many_keys_computed_concurrently() {
        let cache: Arc<SimpleCache<u64, u64>> = Arc::new(
            SimpleCacheBuilder::new().key_lock_shards(8).build(),
        );
        let num_threads = 8;
        let keys_per_thread = 200u64;
        let barrier = Arc::new(Barrier::new(num_threads));

        let handles: Vec<_> = (0..num_threads)
            .map(|_| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for key in 0..keys_per_thread {
                        let value = cache.get_or_insert_with(key, || key * key);
                        assert_eq!(*value, key * key);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), keys_per_thread as usize);
        assert_eq!(cache.in_flight(), 0);
    }
}

// ==============================================
// Producer failure under contention
// ==============================================

mod producer_failure {
    use super::*;

    #[test]
    fn concurrent_failures_leave_no_residue() {
        let cache: Arc<SimpleCache<u8, u8>> = Arc::new(SimpleCache::new());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .try_get_or_insert_with(1, || Err::<u8, _>("unavailable"))
                        .is_err()
                })
            })
            .collect();

        for h in handles {
            assert!(h.join().unwrap());
        }
        assert!(cache.get(&1).is_none());
        assert_eq!(cache.in_flight(), 0);
    }

    #[test]
    fn waiter_recovers_after_holder_fails() {
        init_tracing();
        let cache: Arc<SimpleCache<&'static str, u32>> = Arc::new(SimpleCache::new());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let failing = {
            let cache = cache.clone();
            thread::spawn(move || {
                cache.try_get_or_insert_with("k", || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Err::<u32, _>("first producer failed")
                })
            })
        };
        started_rx.recv().unwrap();

        let retry = {
            let cache = cache.clone();
            thread::spawn(move || cache.try_get_or_insert_with("k", || Ok::<_, String>(9)))
        };
        thread::sleep(Duration::from_millis(20));
        release_tx.send(()).unwrap();

        assert!(failing.join().unwrap().is_err());
        assert_eq!(*retry.join().unwrap().unwrap(), 9);
        assert_eq!(cache.get(&"k").as_deref(), Some(&9));
        assert_eq!(cache.in_flight(), 0);
    }
}

// ==============================================
// Container-wide mutual exclusion
// ==============================================
//
// Every writer stores a value derived from its key, so any reader that sees a
// mismatched value has observed a torn or misplaced write.

mod mutual_exclusion {
    use super::*;

    #[test]
    fn readers_never_observe_torn_writes() {
        let cache: Arc<SimpleCache<u64, (u64, u64)>> = Arc::new(SimpleCache::new());
        let stop = Arc::new(AtomicBool::new(false));
        let inconsistencies = Arc::new(AtomicUsize::new(0));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let stop = stop.clone();
                let inconsistencies = inconsistencies.clone();
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        for key in 0..64u64 {
                            if let Some(value) = cache.get(&key) {
                                if value.0 != key || value.1 != key * 3 {
                                    inconsistencies.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                        }
                    }
                })
            })
            .collect();

        let writers: Vec<_> = (0..4)
            .map(|tid| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for round in 0..300u64 {
                        let key = (round + tid) % 64;
                        match round % 5 {
                            0 => {
                                cache.remove(&key);
                            },
                            1 if tid == 0 => cache.clear(),
                            _ => {
                                cache.put(key, (key, key * 3));
                            },
                        }
                    }
                })
            })
            .collect();

        for w in writers {
            w.join().unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        for r in readers {
            r.join().unwrap();
        }

        assert_eq!(inconsistencies.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn completed_put_is_visible_to_later_get() {
        let cache: Arc<SimpleCache<u32, u32>> = Arc::new(SimpleCache::new());

        let writers: Vec<_> = (0..4u32)
            .map(|tid| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..250u32 {
                        let key = tid * 1_000 + i;
                        cache.put(key, key + 1);
                        assert_eq!(cache.get(&key).as_deref(), Some(&(key + 1)));
                    }
                })
            })
            .collect();

        for w in writers {
            w.join().unwrap();
        }
        assert_eq!(cache.len(), 1_000);
    }

    #[test]
    fn clear_concurrent_with_compute_converges() {
        let cache: Arc<SimpleCache<u16, u16>> = Arc::new(SimpleCache::new());
        let stop = Arc::new(AtomicBool::new(false));

        let clearer = {
            let cache = cache.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    cache.clear();
                    thread::yield_now();
                }
            })
        };

        let computers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for key in 0..500u16 {
                        let value = cache.get_or_insert_with(key % 32, || key % 32);
                        assert_eq!(*value, key % 32);
                    }
                })
            })
            .collect();

        for c in computers {
            c.join().unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        clearer.join().unwrap();

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.in_flight(), 0);
    }
}

// ==============================================
// Lookups while the same thread iterates
// ==============================================
//
// A writer queues on the container lock behind an open iteration. Lookups
// issued by the iterating thread must still complete instead of waiting on
// that writer, which itself waits on the iteration.

mod reads_during_iteration {
    use super::*;

    /// Spawns `put(2, 20)` and waits until it is parked on the container lock.
    fn queue_writer(cache: &Arc<SimpleCache<u32, u32>>) -> thread::JoinHandle<()> {
        let cache = cache.clone();
        let writer = thread::spawn(move || {
            cache.put(2, 20);
        });
        thread::sleep(Duration::from_millis(50));
        writer
    }

    #[test]
    fn get_under_entries_guard_with_queued_writer() {
        init_tracing();
        let cache: Arc<SimpleCache<u32, u32>> = Arc::new(SimpleCache::new());
        cache.put(1, 10);
        let (done_tx, done_rx) = mpsc::channel();

        let iterating = {
            let cache = cache.clone();
            thread::spawn(move || {
                let entries = cache.entries();
                let writer = queue_writer(&cache);
                let mut seen = Vec::new();
                for (key, value) in &entries {
                    assert_eq!(cache.get(key).as_deref(), Some(&*value));
                    assert!(cache.contains_key(key));
                    seen.push(*key);
                }
                assert!(!cache.is_empty());
                done_tx.send((seen, cache.len())).unwrap();
                drop(entries);
                writer.join().unwrap();
            })
        };

        assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)), Ok((vec![1], 1)));
        iterating.join().unwrap();
        assert_eq!(cache.get(&2).as_deref(), Some(&20));
    }

    #[test]
    fn get_inside_for_each_with_queued_writer() {
        init_tracing();
        let cache: Arc<SimpleCache<u32, u32>> = Arc::new(SimpleCache::new());
        cache.put(1, 10);
        cache.put(3, 30);
        let (done_tx, done_rx) = mpsc::channel();

        let iterating = {
            let cache = cache.clone();
            thread::spawn(move || {
                let mut writer = None;
                let mut sum = 0;
                cache.for_each(|key, _| {
                    if writer.is_none() {
                        writer = Some(queue_writer(&cache));
                    }
                    sum += *cache.get(key).unwrap();
                });
                done_tx.send(sum).unwrap();
                if let Some(writer) = writer {
                    writer.join().unwrap();
                }
            })
        };

        assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)), Ok(40));
        iterating.join().unwrap();
        assert_eq!(cache.len(), 3);
    }
}
