use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tokio::sync::{Mutex as BinaryLock, OwnedMutexGuard};
use tracing::debug;

/// One coordination slot: the per-key binary lock plus the number of
/// callers currently interested in it (active acquisitions and outstanding
/// handles). A slot whose count returns to zero is eligible for
/// reclamation by the sweeper.
struct KeyedLockSlot {
    lock: Arc<BinaryLock<()>>,
    ref_count: u32,
}

/// Hands out one binary lock per cache key, reclaiming idle slots so that
/// unbounded key cardinality does not mean unbounded memory.
///
/// The lock is a `tokio::sync::Mutex`, which serves both calling worlds:
/// synchronous callers block on it, asynchronous callers suspend on it.
/// Acquisitions for the same key serialize; acquisitions for different
/// keys are independent. The lock is not reentrant - re-acquiring a key
/// already held by the same thread deadlocks.
///
/// # Reclamation discipline
///
/// The sweeper and acquirers coordinate through the single map-level
/// mutex: an acquirer looks up (or inserts) a slot and bumps its ref count
/// *before* releasing the map guard, and the sweeper removes zero-count
/// slots under the same guard. "Observed zero and removed" is therefore
/// mutually exclusive with any concurrent "observed and incremented";
/// a reclaimed slot can never have a waiter.
pub struct KeyedLockRegistry {
    slots: Mutex<HashMap<String, KeyedLockSlot>>,
}

impl KeyedLockRegistry {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Looks up or creates the slot for `key` and takes a reference on it.
    fn checkout(&self, key: &str) -> Arc<BinaryLock<()>> {
        let mut slots = self.slots.lock();
        let slot = slots
            .entry(key.to_string())
            .or_insert_with(|| KeyedLockSlot {
                lock: Arc::new(BinaryLock::new(())),
                ref_count: 0,
            });
        slot.ref_count += 1;
        slot.lock.clone()
    }

    /// Returns the reference taken by [`checkout`](Self::checkout). The
    /// slot is left in place even at zero; only the sweeper removes slots.
    fn release(&self, key: &str) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(key) {
            slot.ref_count = slot.ref_count.saturating_sub(1);
        }
    }

    /// Acquires the lock for `key`, blocking the calling thread until it
    /// is free. Must not be called from within an async runtime; use
    /// [`acquire_async`](Self::acquire_async) there.
    pub fn acquire<'a>(&'a self, key: &str) -> LockHandle<'a> {
        let mut handle = LockHandle {
            registry: self,
            key: key.to_string(),
            guard: None,
        };
        let lock = self.checkout(key);
        handle.guard = Some(lock.blocking_lock_owned());
        handle
    }

    /// Acquires the lock for `key`, suspending the calling task until it
    /// is free. Dropping the returned future before it completes releases
    /// the nascent slot reference.
    pub async fn acquire_async<'a>(&'a self, key: &str) -> LockHandle<'a> {
        // The handle owns the slot reference from here on, so cancellation
        // at the await point still runs its release.
        let mut handle = LockHandle {
            registry: self,
            key: key.to_string(),
            guard: None,
        };
        let lock = self.checkout(key);
        handle.guard = Some(lock.lock_owned().await);
        handle
    }

    /// Number of slots currently tracked, idle ones included.
    pub fn count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Removes every slot whose ref count is zero. Returns how many were
    /// reclaimed.
    pub fn sweep(&self) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|_, slot| slot.ref_count > 0);
        before - slots.len()
    }

    /// Drops all slots unconditionally. Only used on disposal, once no new
    /// acquisitions can start; outstanding handles degrade to no-ops.
    pub(crate) fn clear(&self) {
        self.slots.lock().clear();
    }
}

impl Default for KeyedLockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped ownership of one key's lock. Dropping the handle releases the
/// binary lock and returns the slot reference, making the slot eligible
/// for reclamation once nobody else holds it.
pub struct LockHandle<'a> {
    registry: &'a KeyedLockRegistry,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LockHandle<'_> {
    fn drop(&mut self) {
        // Release the binary lock before the slot reference so a reclaimed
        // slot can never have a waiter parked on it.
        self.guard.take();
        self.registry.release(&self.key);
    }
}

/// Signals the sweeper thread to stop without waiting out its interval.
struct SweeperSignal {
    stopped: Mutex<bool>,
    wakeup: Condvar,
}

/// Owns the dedicated sweeper thread. Stopping is idempotent and joins
/// the thread, so after [`stop`](SweeperHandle::stop) returns no further
/// sweeps can run.
pub(crate) struct SweeperHandle {
    signal: Arc<SweeperSignal>,
    thread: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    pub(crate) fn stop(&mut self) {
        {
            let mut stopped = self.signal.stopped.lock();
            *stopped = true;
            self.signal.wakeup.notify_all();
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawns the periodic sweeper for `registry`, waking every `interval`.
pub(crate) fn spawn_sweeper(
    registry: Arc<KeyedLockRegistry>,
    interval: Duration,
) -> SweeperHandle {
    let signal = Arc::new(SweeperSignal {
        stopped: Mutex::new(false),
        wakeup: Condvar::new(),
    });
    let thread_signal = Arc::clone(&signal);
    let thread = std::thread::Builder::new()
        .name("rayo-lock-sweeper".to_string())
        .spawn(move || loop {
            {
                let mut stopped = thread_signal.stopped.lock();
                if *stopped {
                    break;
                }
                let _ = thread_signal.wakeup.wait_for(&mut stopped, interval);
                if *stopped {
                    break;
                }
            }
            let reclaimed = registry.sweep();
            if reclaimed > 0 {
                debug!(reclaimed, "reclaimed idle keyed locks");
            }
        })
        .expect("failed to spawn keyed-lock sweeper thread");
    SweeperHandle {
        signal,
        thread: Some(thread),
    }
}
