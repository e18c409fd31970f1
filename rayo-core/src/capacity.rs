use tracing::debug;

use crate::cache_entry::EvictionReason;
use crate::entry_store::EntryStore;
use crate::stats::SizeLedger;
use crate::EvictionStrategy;

/// Smallest fraction the fallback compaction pass will ever request.
const MIN_COMPACT_FRACTION: f64 = 0.02;

/// Brings the cache back under its byte limit after inserts.
///
/// Idempotent and cheap when under the limit (one atomic read and a
/// comparison). When over, it walks a snapshot of `(key, size)` pairs in
/// the configured order - size ascending for `SmallestFirst`, descending
/// for `LargestFirst`, ties broken by key - and removes entries until the
/// running estimate fits.
///
/// Concurrent inserts can outrun the snapshot; in that case a single
/// fallback pass asks the store to compact by a fraction proportional to
/// the overshoot. The enforcer never fails: at worst the cache stays
/// briefly above the limit and the next insert re-triggers it.
pub(crate) struct CapacityEnforcer {
    limit: u64,
    strategy: EvictionStrategy,
}

impl CapacityEnforcer {
    pub(crate) fn new(limit: u64, strategy: EvictionStrategy) -> Self {
        Self { limit, strategy }
    }

    pub(crate) fn enforce<T: Clone>(&self, store: &EntryStore<T>, ledger: &SizeLedger) {
        let total = ledger.total();
        if total <= self.limit {
            return;
        }

        let mut snapshot = ledger.snapshot();
        match self.strategy {
            EvictionStrategy::SmallestFirst => {
                snapshot.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
            }
            EvictionStrategy::LargestFirst => {
                snapshot.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            }
        }

        let mut remaining = total;
        let mut evicted = 0usize;
        for (key, size) in snapshot {
            if remaining <= self.limit {
                break;
            }
            if store.remove(&key, EvictionReason::Capacity) {
                remaining = remaining.saturating_sub(size);
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!(evicted, limit = self.limit, "capacity eviction pass");
        }

        // Concurrent inserts may have landed behind the snapshot's back.
        let live = ledger.total();
        if live > self.limit {
            let over = live - self.limit;
            let fraction = (over as f64 / live as f64).clamp(MIN_COMPACT_FRACTION, 1.0);
            let removed = store.compact(fraction);
            debug!(removed, fraction, "capacity fallback compaction");
        }
    }
}
