//! Multi-consumer cache: many threads may hold the same block pinned simultaneously.
//! Fill is lazy, guarded by a per-slot mutex so the first `get` after a `request`
//! reads from storage and every later `get` just observes `Ready`.

use std::sync::atomic::Ordering;
use std::sync::RwLockReadGuard;

use crate::block::{BlockId, EdgeBlock};
use crate::cache::slot::{ClockState, Status, EVICTING};
use crate::directory::Directory;
use crate::serializer::BlockSerializer;

pub struct BlockCache {
    state: ClockState,
    directory: Directory,
}

impl BlockCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: ClockState::new(capacity),
            directory: Directory::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity()
    }

    /// Requests a pin on `block_id`, installing a fresh slot if necessary. Unlike
    /// [`crate::cache::simple::SimpleCache::request`], concurrent callers may request
    /// the same block; all but the first observe a hit.
    pub fn request(&self, block_id: BlockId) -> usize {
        // Fast path: no hand lock. Spin the CAS loop while the slot still holds our
        // block and hasn't been claimed for eviction.
        if let Some(idx) = self.directory.if_contains(block_id, |idx| idx) {
            let slot = &self.state.slots[idx];
            let mut current = slot.pins.load(Ordering::Acquire);
            loop {
                if current == EVICTING {
                    break;
                }
                if slot.meta.lock().unwrap().block_id != Some(block_id) {
                    break;
                }
                match slot.pins.compare_exchange_weak(
                    current,
                    current + 1,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => {
                        slot.ref_count.fetch_add(1, Ordering::AcqRel);
                        return idx;
                    }
                    Err(observed) => current = observed,
                }
            }
        }

        // Slow path: hand lock held throughout, including the directory recheck (a
        // second thread may have inserted the block between our fast-path miss and
        // here).
        self.state.allocate(
            &self.directory,
            block_id,
            Some(|slot: &crate::cache::slot::Slot| {
                slot.pins.fetch_add(1, Ordering::AcqRel);
                slot.ref_count.fetch_add(1, Ordering::AcqRel);
            }),
            |slot| {
                slot.pins.store(1, Ordering::Release);
                slot.ref_count.store(1, Ordering::Release);
            },
        )
    }

    /// Returns a read guard over the slot buffer, performing the lazy fill under a
    /// double-checked per-slot lock on first access.
    pub fn get(
        &self,
        slot_idx: usize,
        block_id: BlockId,
        serializer: &dyn BlockSerializer,
    ) -> std::io::Result<RwLockReadGuard<'_, EdgeBlock>> {
        let slot = &self.state.slots[slot_idx];
        {
            let meta = slot.meta.lock().unwrap();
            assert_eq!(
                meta.block_id,
                Some(block_id),
                "get called for slot {slot_idx} with mismatched block id"
            );
        }

        if slot.meta.lock().unwrap().status == Status::Reserved {
            let _fill_guard = slot.fill_lock.lock().unwrap();
            if slot.meta.lock().unwrap().status == Status::Reserved {
                serializer.read_block(block_id, &mut slot.buffer.write().unwrap())?;
                slot.meta.lock().unwrap().status = Status::Ready;
            }
        }

        Ok(slot.buffer.read().unwrap())
    }

    pub fn release(&self, slot_idx: usize) {
        let prev = self.state.slots[slot_idx].pins.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "release called on slot {slot_idx} with no outstanding pin");
    }

    pub fn clear(&self) {
        self.state.clear();
        self.directory.clear();
    }

    #[cfg(test)]
    pub fn directory_len(&self) -> usize {
        self.directory.len()
    }

    #[cfg(test)]
    pub fn pin_count(&self, slot_idx: usize) -> i64 {
        self.state.slots[slot_idx].pins.load(Ordering::Acquire)
    }
}
