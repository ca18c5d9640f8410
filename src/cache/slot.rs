//! The clock-hand state machine shared by [`crate::cache::simple::SimpleCache`] and
//! [`crate::cache::block_cache::BlockCache`].
//!
//! Per Design Note in the expanded spec, the two caches are near-duplicates
//! parametrised only by pinning cardinality (single-holder vs counted). This module
//! holds the one piece that must not drift between them: the free-slot fast path and
//! the eviction sweep. Each cache supplies how a freshly chosen slot gets pinned
//! (`install_new`) and, for the multi-pin cache, how an existing hit gets re-pinned
//! under the hand lock (`recheck_on_hit`); everything about *which* slot is chosen
//! lives here exactly once.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use crate::block::{BlockId, EdgeBlock};
use crate::directory::Directory;

/// Sentinel pin value held only during the critical section of eviction.
pub(crate) const EVICTING: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Empty,
    Reserved,
    Ready,
}

#[derive(Debug)]
pub(crate) struct SlotMeta {
    pub block_id: Option<BlockId>,
    pub status: Status,
}

/// One cache entry.
///
/// `pins` and `ref_count` are atomics so the hit fast path never needs to take the
/// hand lock: `pins == 0` unpinned, `pins > 0` held (capped at 1 by the single-pin
/// cache, an arbitrary count by the multi-pin cache), `pins == EVICTING` claimed by a
/// sweep in progress. `fill_lock` is only used by the multi-pin cache's
/// double-checked lazy fill; the single-pin cache fills eagerly and ignores it.
#[derive(Debug)]
pub(crate) struct Slot {
    pub buffer: RwLock<EdgeBlock>,
    pub pins: AtomicI64,
    pub ref_count: AtomicI64,
    pub meta: Mutex<SlotMeta>,
    pub fill_lock: Mutex<()>,
}

impl Slot {
    fn empty() -> Self {
        Self {
            buffer: RwLock::new(EdgeBlock::zeroed()),
            pins: AtomicI64::new(0),
            ref_count: AtomicI64::new(0),
            meta: Mutex::new(SlotMeta {
                block_id: None,
                status: Status::Empty,
            }),
            fill_lock: Mutex::new(()),
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pins.load(Ordering::Acquire) != 0
    }
}

/// Shared clock-hand bookkeeping: the slot vector, the hand position, and a count of
/// never-yet-used slots. Embedded by value in both cache types.
#[derive(Debug)]
pub(crate) struct ClockState {
    pub slots: Vec<Slot>,
    hand: Mutex<usize>,
    free_count: AtomicUsize,
}

impl ClockState {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be positive");
        Self {
            slots: (0..capacity).map(|_| Slot::empty()).collect(),
            hand: Mutex::new(0),
            free_count: AtomicUsize::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&self) {
        let mut hand = self.hand.lock().unwrap();
        for slot in &self.slots {
            let mut meta = slot.meta.lock().unwrap();
            meta.block_id = None;
            meta.status = Status::Empty;
            slot.pins.store(0, Ordering::Release);
            slot.ref_count.store(0, Ordering::Release);
        }
        self.free_count.store(self.slots.len(), Ordering::Release);
        *hand = 0;
    }

    /// Finds a slot for `block_id`: either a free slot, an existing resident slot (if
    /// `recheck_on_hit` is supplied and the directory already has an entry by the
    /// time the hand lock is acquired), or an evicted victim. Runs `install_new` on
    /// whichever slot was freshly claimed (free or evicted), and `on_hit` if an
    /// existing entry was found via the recheck, all while still holding the hand
    /// lock so no other thread can observe the directory entry before the pin state
    /// is installed.
    pub fn allocate<H, N>(
        &self,
        directory: &Directory,
        block_id: BlockId,
        recheck_on_hit: Option<H>,
        install_new: N,
    ) -> usize
    where
        H: FnOnce(&Slot),
        N: FnOnce(&Slot),
    {
        let mut hand = self.hand.lock().unwrap();

        if let Some(on_hit) = recheck_on_hit {
            if let Some(idx) = directory.if_contains(block_id, |idx| idx) {
                on_hit(&self.slots[idx]);
                return idx;
            }
        }

        if self.free_count.load(Ordering::Acquire) > 0 {
            loop {
                let idx = *hand;
                *hand = (idx + 1) % self.slots.len();
                let mut meta = self.slots[idx].meta.lock().unwrap();
                if meta.status == Status::Empty {
                    self.free_count.fetch_sub(1, Ordering::AcqRel);
                    let inserted = directory.try_emplace(block_id, idx);
                    assert!(
                        inserted,
                        "directory invariant violated: slot {idx} already mapped while marked empty"
                    );
                    meta.block_id = Some(block_id);
                    meta.status = Status::Reserved;
                    drop(meta);
                    install_new(&self.slots[idx]);
                    return idx;
                }
            }
        }

        // Eviction sweep. Bound the number of candidate slots we are willing to
        // examine before concluding the working set does not fit: this is the
        // "detect N full sweeps without progress" escalation from the error-handling
        // design (all slots pinned is a caller precondition violation, not a hang).
        let sweep_limit = self.slots.len().saturating_mul(2).max(1);
        for _ in 0..sweep_limit {
            let idx = *hand;
            *hand = (idx + 1) % self.slots.len();

            if self.slots[idx].pins.load(Ordering::Acquire) != 0 {
                continue;
            }
            let prev = self.slots[idx].ref_count.fetch_sub(1, Ordering::AcqRel);
            if prev != 1 {
                continue; // not yet (or no longer) exactly zero; give it another pass
            }
            if self.slots[idx]
                .pins
                .compare_exchange(0, EVICTING, Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
            {
                continue; // lost the race to a concurrent pin or eviction
            }

            let mut meta = self.slots[idx].meta.lock().unwrap();
            if let Some(old_block_id) = meta.block_id.take() {
                let erased = directory.erase_if(old_block_id, |slot| slot == idx);
                assert!(
                    erased,
                    "directory invariant violated: evicted slot {idx} missing its directory entry"
                );
            }
            let inserted = directory.try_emplace(block_id, idx);
            assert!(
                inserted,
                "directory invariant violated: slot {idx} already mapped right after eviction"
            );
            meta.block_id = Some(block_id);
            meta.status = Status::Reserved;
            drop(meta);
            install_new(&self.slots[idx]);
            return idx;
        }

        debug!("clock sweep exhausted after {sweep_limit} steps requesting block {block_id}");
        panic!(
            "cache exhausted: {sweep_limit} clock-sweep steps made no progress; \
             the working set does not fit in {} slots (all pinned)",
            self.slots.len()
        );
    }
}
