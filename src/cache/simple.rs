//! Single-pin cache: at most one thread consumes a given block at a time.
//!
//! The caller (here, the graph's "per-block" traversal shape) is responsible for
//! ensuring no two threads request the same block concurrently; in exchange the hit
//! path is a single CAS with no directory recheck under a lock.

use std::sync::atomic::Ordering;
use std::sync::RwLockReadGuard;

use crate::block::{BlockId, EdgeBlock};
use crate::cache::slot::{ClockState, Status};
use crate::directory::Directory;
use crate::serializer::BlockSerializer;

pub struct SimpleCache {
    state: ClockState,
    directory: Directory,
}

impl SimpleCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: ClockState::new(capacity),
            directory: Directory::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity()
    }

    /// Requests a pin on `block_id`. Returns the slot index and whether the slot
    /// still needs [`Self::fill`] before its contents are valid (true for a freshly
    /// allocated/evicted slot, false for a hit on an already-ready slot).
    pub fn request(&self, block_id: BlockId, ref_hint: i64) -> (usize, bool) {
        if let Some(idx) = self.directory.if_contains(block_id, |idx| idx) {
            if self.state.slots[idx]
                .pins
                .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                self.state.slots[idx].ref_count.fetch_add(ref_hint, Ordering::AcqRel);
                let needs_fill = self.state.slots[idx].meta.lock().unwrap().status != Status::Ready;
                return (idx, needs_fill);
            }
        }

        let idx = self.state.allocate(
            &self.directory,
            block_id,
            None::<fn(&crate::cache::slot::Slot)>,
            |slot| {
                slot.pins.store(1, Ordering::Release);
                slot.ref_count.store(ref_hint, Ordering::Release);
            },
        );
        (idx, true)
    }

    /// Fills a freshly reserved slot from the serializer. Precondition: the caller
    /// holds the pin returned by `request` and the slot is still `Reserved`.
    pub fn fill(
        &self,
        slot_idx: usize,
        block_id: BlockId,
        serializer: &dyn BlockSerializer,
    ) -> std::io::Result<()> {
        let slot = &self.state.slots[slot_idx];
        {
            let meta = slot.meta.lock().unwrap();
            assert_eq!(
                meta.block_id,
                Some(block_id),
                "fill called for slot {slot_idx} with mismatched block id"
            );
            assert_eq!(
                meta.status,
                Status::Reserved,
                "fill called on slot {slot_idx} that is not in Reserved status"
            );
        }
        serializer.read_block(block_id, &mut slot.buffer.write().unwrap())?;
        slot.meta.lock().unwrap().status = Status::Ready;
        Ok(())
    }

    /// Returns a read guard over the slot buffer. Only valid while pinned.
    pub fn get(&self, slot_idx: usize) -> RwLockReadGuard<'_, EdgeBlock> {
        self.state.slots[slot_idx].buffer.read().unwrap()
    }

    /// Clears the pin. The reference counter is untouched here; only the clock scan
    /// and a subsequent `request` modify it.
    pub fn release(&self, slot_idx: usize) {
        let prev = self.state.slots[slot_idx].pins.swap(0, Ordering::AcqRel);
        assert_eq!(prev, 1, "release called on slot {slot_idx} that was not pinned");
    }

    pub fn clear(&self) {
        self.state.clear();
        self.directory.clear();
    }

    #[cfg(test)]
    pub fn directory_len(&self) -> usize {
        self.directory.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::InMemorySerializer;

    fn filled_serializer(num_blocks: u32) -> InMemorySerializer {
        let s = InMemorySerializer::for_write();
        for b in 0..num_blocks {
            let mut block = EdgeBlock::zeroed();
            block.as_mut_slice()[0] = b;
            s.write_block(b, &block).unwrap();
        }
        s
    }

    #[test]
    fn scenario_1_capacity_4_fifth_request_evicts_one_of_first_four() {
        let cache = SimpleCache::new(4);
        let serializer = filled_serializer(6);

        for b in 1..=4 {
            let (idx, needs_fill) = cache.request(b, 1);
            assert!(needs_fill);
            cache.fill(idx, b, &serializer).unwrap();
            cache.release(idx);
        }
        assert_eq!(cache.directory_len(), 4);

        let (idx5, needs_fill) = cache.request(5, 1);
        assert!(needs_fill);
        cache.fill(idx5, 5, &serializer).unwrap();
        assert_eq!(cache.get(idx5).as_slice()[0], 5);
        cache.release(idx5);

        assert_eq!(cache.directory_len(), 4);
    }

    #[test]
    fn idempotent_rerequest_same_slot_when_not_evicted() {
        let cache = SimpleCache::new(4);
        let serializer = filled_serializer(2);

        let (idx1, _) = cache.request(1, 1);
        cache.fill(idx1, 1, &serializer).unwrap();
        cache.release(idx1);

        let (idx2, needs_fill) = cache.request(1, 1);
        assert_eq!(idx1, idx2);
        assert!(!needs_fill);
        cache.release(idx2);
    }

    #[test]
    fn ref_hint_is_additive_on_rerequest() {
        let cache = SimpleCache::new(4);
        let serializer = filled_serializer(1);
        let (idx, _) = cache.request(1, 2);
        cache.fill(idx, 1, &serializer).unwrap();
        cache.release(idx);

        let (idx2, _) = cache.request(1, 3);
        assert_eq!(idx, idx2);
        assert_eq!(cache.state.slots[idx2].ref_count.load(Ordering::Acquire), 5);
        cache.release(idx2);
    }

    #[test]
    #[should_panic(expected = "not pinned")]
    fn release_without_pin_is_fatal() {
        let cache = SimpleCache::new(1);
        cache.release(0);
    }

    #[test]
    #[should_panic(expected = "cache exhausted")]
    fn all_slots_pinned_escalates_to_a_panic() {
        let cache = SimpleCache::new(4);
        let serializer = filled_serializer(5);

        for b in 1..=4 {
            let (idx, needs_fill) = cache.request(b, 1);
            assert!(needs_fill);
            cache.fill(idx, b, &serializer).unwrap();
            // deliberately never released: every slot stays pinned
        }

        cache.request(5, 1);
    }
}
