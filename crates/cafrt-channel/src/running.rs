//! Running accesses (`spec.md` §3 "Running accesses"): in-flight
//! remote-function requests keyed by a monotonically increasing id, so a
//! request can reference extra data living in its own message buffer
//! rather than in registered memory.
//!
//! Mutated from the main thread; read-only lookups happen from the
//! communication thread (`spec.md` §5 "Shared resources"), so the table
//! is kept behind a `Mutex` even though writers and readers never race on
//! the same entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use cafrt_core::{CafError, RunningAccessId};

/// Extra data associated with one in-flight request; opaque to this crate.
#[derive(Clone, Debug)]
pub struct RunningAccess {
    pub add_data: Vec<u8>,
}

#[derive(Default)]
pub struct RunningAccessList {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, RunningAccess>>,
}

impl RunningAccessList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, add_data: Vec<u8>) -> RunningAccessId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries
            .lock()
            .expect("running access list mutex poisoned")
            .insert(id, RunningAccess { add_data });
        RunningAccessId(id)
    }

    pub fn get(&self, id: RunningAccessId) -> Result<RunningAccess, CafError> {
        self.entries
            .lock()
            .expect("running access list mutex poisoned")
            .get(&id.0)
            .cloned()
            .ok_or_else(|| CafError::Fatal(format!("unknown running access id {}", id.0)))
    }

    pub fn remove(&self, id: RunningAccessId) -> Option<RunningAccess> {
        self.entries
            .lock()
            .expect("running access list mutex poisoned")
            .remove(&id.0)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("running access list mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonically_increasing() {
        let list = RunningAccessList::new();
        let a = list.insert(vec![1]);
        let b = list.insert(vec![2]);
        assert!(b.0 > a.0);
    }

    #[test]
    fn insert_then_get_roundtrips_add_data() {
        let list = RunningAccessList::new();
        let id = list.insert(vec![7, 8, 9]);
        let entry = list.get(id).unwrap();
        assert_eq!(entry.add_data, vec![7, 8, 9]);
    }

    #[test]
    fn remove_drops_the_entry() {
        let list = RunningAccessList::new();
        let id = list.insert(vec![1]);
        assert!(list.remove(id).is_some());
        assert!(list.get(id).is_err());
    }
}
