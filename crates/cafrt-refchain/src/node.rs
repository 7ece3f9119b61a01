//! Reference-chain node types (`spec.md` §3 "Reference chain").
//!
//! A chain is caller-owned (`spec.md` §3 "Ownership summary"); this crate
//! only ever reads it, never frees it, so we model it as a borrowed slice
//! of [`RefNode`] rather than reconstructing the original's intrusive
//! singly-linked list — the traversal order is identical either way.

use cafrt_descriptor::MAX_RANK;

/// One subscript in an [`RefNode::Array`]/[`RefNode::StaticArray`] node,
/// mirroring `caf_array_ref_t` in `original_source/src/libcaf.h`.
#[derive(Clone, Debug)]
pub enum DimSelector {
    /// `(:)` — the whole dimension.
    Full { stride: i64 },
    /// `(start:end:stride)`.
    Range { start: i64, end: i64, stride: i64 },
    /// A single subscript; rank-reducing.
    Single { index: i64 },
    /// `(i:)` — open-ended lower bound.
    OpenEnd { start: i64, stride: i64 },
    /// `(:i)` — open-ended upper bound, supplied by the remote side.
    OpenStart { end: i64, stride: i64 },
    /// A vector subscript: `nvec` entries of the given integer kind.
    Vector { indices: Vec<i64>, kind: i32 },
    /// Dimension not referenced by this node at all.
    None,
}

impl DimSelector {
    /// A zero stride in a triplet selector requests rank reduction for
    /// this dimension (`spec.md` §3 "Array").
    pub fn is_rank_reducing(&self) -> bool {
        matches!(self, DimSelector::Single { .. })
            || matches!(self, DimSelector::Range { stride: 0, .. })
            || matches!(self, DimSelector::Full { stride: 0 })
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, DimSelector::Vector { .. })
    }
}

/// One node of a reference chain (`spec.md` §3).
#[derive(Clone, Debug)]
pub enum RefNode {
    /// Dereference to an allocatable/pointer component of a derived type.
    Component {
        byte_offset: isize,
        /// `> 0` when the memory behind `byte_offset` is itself a (slave)
        /// token reached through the global dynamic window; `0` otherwise.
        token_sub_offset: isize,
    },
    /// Subscripting a coarray/array with its own remote descriptor.
    Array {
        dims: Vec<DimSelector>,
        item_size: usize,
    },
    /// Subscripting a static (non-descriptor) array of known element type.
    StaticArray {
        dims: Vec<DimSelector>,
        item_size: usize,
        element_len: usize,
    },
}

impl RefNode {
    pub fn is_array_like(&self) -> bool {
        matches!(self, RefNode::Array { .. } | RefNode::StaticArray { .. })
    }

    pub fn dims(&self) -> Option<&[DimSelector]> {
        match self {
            RefNode::Array { dims, .. } | RefNode::StaticArray { dims, .. } => Some(dims),
            RefNode::Component { .. } => None,
        }
    }
}

/// A reference chain: an ordered sequence of [`RefNode`]s, traversed in the
/// order they appear (`spec.md` §4.E "Orderings and tie-breaks"). At most
/// one node may be array-like; a second is a "double array ref" and is
/// rejected (`spec.md` §4.E "Failure model").
pub type RefChain<'a> = &'a [RefNode];

pub fn array_ref_count(chain: RefChain<'_>) -> usize {
    chain.iter().filter(|n| n.is_array_like()).count()
}

pub const _MAX_RANK_CHECK: usize = MAX_RANK;
