use crate::superblock::Superblock;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

/// The sealed-superblock store (§5 "accessed serially from the assembler;
/// readers use a versioned snapshot"). Writes (`push`) happen one at a
/// time from the coordinator task; readers call [`SuperblockStore::snapshot`]
/// to get an `Arc` over an immutable view that a concurrent `push` can't
/// mutate out from under them.
pub struct SuperblockStore {
    inner: RwLock<Arc<Snapshot>>,
    max_retained: usize,
}

struct Snapshot {
    history: VecDeque<Superblock>,
}

impl SuperblockStore {
    pub fn new(max_retained: usize) -> Self {
        SuperblockStore { inner: RwLock::new(Arc::new(Snapshot { history: VecDeque::new() })), max_retained }
    }

    /// Appends a newly-sealed superblock, publishing a fresh snapshot.
    pub fn push(&self, superblock: Superblock) {
        let mut guard = self.inner.write().unwrap();
        let mut history = guard.history.clone();
        history.push_back(superblock);
        while history.len() > self.max_retained {
            history.pop_front();
        }
        *guard = Arc::new(Snapshot { history });
    }

    /// The most recently sealed superblock, if any.
    pub fn latest(&self) -> Option<Superblock> {
        self.inner.read().unwrap().history.back().cloned()
    }

    /// A stable, versioned view of retained superblocks, oldest first.
    /// Concurrent `push` calls never mutate the returned `Vec`.
    pub fn snapshot(&self) -> Vec<Superblock> {
        self.inner.read().unwrap().history.iter().cloned().collect()
    }

    pub fn get(&self, number: u64) -> Option<Superblock> {
        self.inner.read().unwrap().history.iter().find(|s| s.number == number).cloned()
    }
}

impl Default for SuperblockStore {
    fn default() -> Self {
        SuperblockStore::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_base::{Hash32, Slot};

    fn sb(number: u64) -> Superblock {
        Superblock {
            number,
            slot: Slot(number),
            parent_hash: Hash32::ZERO,
            l2_blocks: vec![],
            included_xts: vec![],
            merkle_root: Hash32::ZERO,
            hash: Hash32::ZERO,
            timestamp: 0,
        }
    }

    #[test]
    fn latest_reflects_most_recent_push() {
        let store = SuperblockStore::new(8);
        store.push(sb(1));
        store.push(sb(2));
        assert_eq!(store.latest().unwrap().number, 2);
    }

    #[test]
    fn retention_evicts_oldest_first() {
        let store = SuperblockStore::new(2);
        store.push(sb(1));
        store.push(sb(2));
        store.push(sb(3));
        let nums: Vec<u64> = store.snapshot().iter().map(|s| s.number).collect();
        assert_eq!(nums, vec![2, 3]);
    }

    #[test]
    fn get_finds_by_number() {
        let store = SuperblockStore::new(8);
        store.push(sb(1));
        store.push(sb(2));
        assert_eq!(store.get(1).unwrap().number, 1);
        assert!(store.get(99).is_none());
    }
}
