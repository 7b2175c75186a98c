//! Per-group numeric id allocation.
//!
//! Every server gets a small positive integer that is unique within its
//! group, so operators can say `lobby-3` instead of quoting a ULID. Ids are
//! reused: after `lobby-2` is removed, the next server in `lobby` gets 2
//! again.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

/// Hands out the smallest free id per group.
///
/// A single mutex covers both the free-id scan and the reservation, so two
/// concurrent callers can never receive the same id.
#[derive(Debug, Default)]
pub struct NumericIdAllocator {
    held: Mutex<HashMap<String, BTreeSet<u32>>>,
}

impl NumericIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, BTreeSet<u32>>> {
        // A panic while holding the lock cannot leave the map half-written.
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserves and returns the smallest positive id not held in `group`.
    pub fn allocate(&self, group: &str) -> u32 {
        let mut held = self.lock();
        let ids = held.entry(group.to_string()).or_default();

        let mut candidate = 1;
        while ids.contains(&candidate) {
            candidate += 1;
        }
        ids.insert(candidate);

        debug!(group, numeric_id = candidate, "Allocated numeric id");
        candidate
    }

    /// Returns `id` to the pool. Returns false if it was not held.
    pub fn release(&self, group: &str, id: u32) -> bool {
        let mut held = self.lock();
        let Some(ids) = held.get_mut(group) else {
            return false;
        };

        let released = ids.remove(&id);
        if ids.is_empty() {
            held.remove(group);
        }

        debug!(group, numeric_id = id, released, "Released numeric id");
        released
    }

    /// Marks `id` as held without scanning, used when rebuilding from storage.
    ///
    /// Returns false if the id was already held.
    pub fn reserve(&self, group: &str, id: u32) -> bool {
        self.lock().entry(group.to_string()).or_default().insert(id)
    }

    /// Ids currently held in `group`, ascending.
    pub fn held(&self, group: &str) -> Vec<u32> {
        self.lock()
            .get(group)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_sequential_allocation() {
        let allocator = NumericIdAllocator::new();
        assert_eq!(allocator.allocate("lobby"), 1);
        assert_eq!(allocator.allocate("lobby"), 2);
        assert_eq!(allocator.allocate("bedwars"), 1);
    }

    #[test]
    fn test_reuse_after_release() {
        let allocator = NumericIdAllocator::new();
        let first = allocator.allocate("lobby");
        assert!(allocator.release("lobby", first));
        assert_eq!(allocator.allocate("lobby"), first);
    }

    #[test]
    fn test_fills_lowest_gap() {
        let allocator = NumericIdAllocator::new();
        for _ in 0..4 {
            allocator.allocate("lobby");
        }
        allocator.release("lobby", 2);
        allocator.release("lobby", 3);
        assert_eq!(allocator.allocate("lobby"), 2);
        assert_eq!(allocator.held("lobby"), vec![1, 2, 4]);
    }

    #[test]
    fn test_release_unknown_is_noop() {
        let allocator = NumericIdAllocator::new();
        assert!(!allocator.release("lobby", 7));
        allocator.allocate("lobby");
        assert!(!allocator.release("lobby", 7));
    }

    #[test]
    fn test_reserve_skips_held_ids() {
        let allocator = NumericIdAllocator::new();
        assert!(allocator.reserve("lobby", 1));
        assert!(allocator.reserve("lobby", 3));
        assert!(!allocator.reserve("lobby", 3));
        assert_eq!(allocator.allocate("lobby"), 2);
        assert_eq!(allocator.allocate("lobby"), 4);
    }

    #[test]
    fn test_concurrent_allocations_are_unique() {
        const CALLERS: u32 = 64;
        let allocator = Arc::new(NumericIdAllocator::new());

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                std::thread::spawn(move || allocator.allocate("lobby"))
            })
            .collect();

        let ids: HashSet<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids, (1..=CALLERS).collect());
    }

    proptest! {
        #[test]
        fn prop_allocate_returns_smallest_free(ops in proptest::collection::vec((any::<bool>(), 1u32..16), 1..64)) {
            let allocator = NumericIdAllocator::new();
            let mut model: BTreeSet<u32> = BTreeSet::new();

            for (allocate, id) in ops {
                if allocate {
                    let expected = (1..).find(|c| !model.contains(c)).unwrap();
                    prop_assert_eq!(allocator.allocate("g"), expected);
                    model.insert(expected);
                } else {
                    prop_assert_eq!(allocator.release("g", id), model.remove(&id));
                }
            }

            prop_assert_eq!(allocator.held("g"), model.into_iter().collect::<Vec<_>>());
        }
    }
}
