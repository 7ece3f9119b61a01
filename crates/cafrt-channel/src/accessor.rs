//! The accessor table (`spec.md` §3 "Accessor table", §4.F "Accessor
//! lifecycle", §9 "Dynamic dispatch").
//!
//! Replaces the original's `void(*)()` table with a tagged
//! [`Accessor`] enum, sorted once by hash and looked up with binary
//! search. The three-state lifecycle (`Uninitialized` -> `Open` ->
//! `Prepared`) is a small finite automaton: `Prepared -> Open` is allowed
//! only when a new registration arrives.

use cafrt_core::CafError;

/// A getter reads `add_data` (the caller's opaque extra bytes) and returns
/// the fetched payload.
pub type GetterFn = fn(add_data: &[u8]) -> Vec<u8>;
/// A predicate reports whether the named remote value is present.
pub type PredicateFn = fn(add_data: &[u8]) -> bool;
/// A receiver writes `payload` using `add_data` for addressing context.
pub type ReceiverFn = fn(add_data: &[u8], payload: &[u8]);

/// A statically-registered function executed on a remote image
/// (`spec.md` §3 "Accessor table", GLOSSARY "Accessor").
#[derive(Clone, Copy)]
pub enum Accessor {
    Getter(GetterFn),
    Predicate(PredicateFn),
    Receiver(ReceiverFn),
}

impl std::fmt::Debug for Accessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Accessor::Getter(_) => "Getter",
            Accessor::Predicate(_) => "Predicate",
            Accessor::Receiver(_) => "Receiver",
        };
        write!(f, "Accessor::{kind}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Open,
    Prepared,
}

/// Grows the backing vector 16 slots at a time, matching `spec.md` §4.F
/// "`register_accessor` ... appends to the table (grows by 16 slots)".
const GROWTH_CHUNK: usize = 16;

/// A sorted, binary-searchable table of `(hash, Accessor)` pairs.
pub struct AccessorTable {
    entries: Vec<(u64, Accessor)>,
    state: Lifecycle,
}

impl Default for AccessorTable {
    fn default() -> Self {
        AccessorTable {
            entries: Vec::new(),
            state: Lifecycle::Uninitialized,
        }
    }
}

impl AccessorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// `spec.md` §4.F `register_accessor`. Valid from `Uninitialized` or
    /// `Open`; registering after `Prepared` reverts the table to `Open`
    /// (`spec.md` §4.F "Registering after finish reverts the state to
    /// Open").
    pub fn register(&mut self, hash: u64, accessor: Accessor) {
        if self.entries.len() == self.entries.capacity() {
            self.entries.reserve(GROWTH_CHUNK);
        }
        self.entries.push((hash, accessor));
        self.state = Lifecycle::Open;
    }

    /// `spec.md` §4.F `register_accessors_finish`: sorts the table; from
    /// then on lookups are O(log N) via binary search.
    pub fn finish(&mut self) {
        self.entries.sort_by_key(|(hash, _)| *hash);
        self.state = Lifecycle::Prepared;
    }

    /// `spec.md` §4.F `get_remote_function_index`. Requires the table to
    /// be `Prepared`; any lookup on an `Open`/`Uninitialized` table is a
    /// programming error in the caller (the ABI layer always calls
    /// `register_accessors_finish` once, at the end of `init`).
    pub fn find(&self, hash: u64) -> Result<usize, CafError> {
        if self.state != Lifecycle::Prepared {
            return Err(CafError::Fatal(
                "accessor table lookup before register_accessors_finish".into(),
            ));
        }
        self.entries
            .binary_search_by_key(&hash, |(h, _)| *h)
            .map_err(|_| CafError::Fatal(format!("no accessor registered for hash {hash}")))
    }

    pub fn get(&self, index: usize) -> Result<&Accessor, CafError> {
        self.entries
            .get(index)
            .map(|(_, a)| a)
            .ok_or_else(|| CafError::Fatal(format!("accessor index {index} out of range")))
    }

    pub fn hash_at(&self, index: usize) -> Option<u64> {
        self.entries.get(index).map(|(h, _)| *h)
    }

    pub fn is_prepared(&self) -> bool {
        self.state == Lifecycle::Prepared
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_getter(_: &[u8]) -> Vec<u8> {
        Vec::new()
    }

    #[test]
    fn lookup_before_finish_is_fatal() {
        let mut table = AccessorTable::new();
        table.register(10, Accessor::Getter(noop_getter));
        assert!(table.find(10).is_err());
    }

    #[test]
    fn find_after_finish_matches_hash() {
        let mut table = AccessorTable::new();
        table.register(30, Accessor::Getter(noop_getter));
        table.register(10, Accessor::Getter(noop_getter));
        table.register(20, Accessor::Getter(noop_getter));
        table.finish();
        for &hash in &[10u64, 20, 30] {
            let idx = table.find(hash).unwrap();
            assert_eq!(table.hash_at(idx), Some(hash));
        }
    }

    #[test]
    fn registering_after_finish_reverts_to_open() {
        let mut table = AccessorTable::new();
        table.register(1, Accessor::Getter(noop_getter));
        table.finish();
        assert!(table.is_prepared());
        table.register(2, Accessor::Getter(noop_getter));
        assert!(!table.is_prepared());
        assert!(table.find(1).is_err());
        table.finish();
        assert!(table.find(2).is_ok());
    }

    #[test]
    fn unknown_hash_is_not_found() {
        let mut table = AccessorTable::new();
        table.register(5, Accessor::Getter(noop_getter));
        table.finish();
        assert!(table.find(999).is_err());
    }
}
