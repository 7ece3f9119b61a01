//! Component A: the descriptor model.
//!
//! A [`Descriptor`] is a typed, multidimensional view of memory: a base
//! pointer, an element length, and `rank` dimension records of
//! `(lower_bound, extent, stride_bytes)`. This crate is purely local —
//! nothing here touches MPI or threads — so it can be exercised with plain
//! unit tests. See `spec.md` §3 "Descriptor" and §4.A.

mod contiguity;
mod dims;
pub mod iso;
mod ops;
mod typekind;

pub use contiguity::Contiguity;
pub use dims::Dimension;
pub use typekind::{BaseType, TypeKind};

use cafrt_core::CafError;

/// Upper bound on rank, matching `gfc_max_dimensions` in the ISO descriptor
/// standard (`spec.md` §3).
pub const MAX_RANK: usize = 15;

/// How a coarray/array object obtained its storage; affects reallocation
/// rules in the reference-chain interpreter (`spec.md` §4.E).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attribute {
    Pointer,
    Allocatable,
    Other,
}

/// A typed multidimensional view of memory (`spec.md` §3 "Descriptor").
///
/// `base` is a raw pointer into either local memory or, when the descriptor
/// describes a "slave" token's payload, a value meaningful only through the
/// global dynamic window (`spec.md` §3 "Token"). This crate never
/// dereferences `base`; it only does address arithmetic, so the pointer's
/// provenance is the caller's concern.
#[derive(Clone, Copy, Debug)]
pub struct Descriptor {
    pub base: *mut u8,
    pub elem_len: usize,
    pub version: i32,
    pub rank: u8,
    pub attribute: Attribute,
    pub type_kind: TypeKind,
    pub offset: Option<isize>,
    pub span: usize,
    dims: [Dimension; MAX_RANK],
}

// SAFETY: Descriptor is a plain-old-data handle; it carries no borrow and
// is Send/Sync only in the sense that passing the raw address across an
// image boundary is exactly what the runtime does on purpose. Callers are
// responsible for not racing writes through it without the usual CAF
// synchronization.
unsafe impl Send for Descriptor {}
unsafe impl Sync for Descriptor {}

impl Descriptor {
    /// Builds a rank-0 (scalar) descriptor over `base`.
    pub fn scalar(base: *mut u8, elem_len: usize, type_kind: TypeKind, attribute: Attribute) -> Self {
        Descriptor {
            base,
            elem_len,
            version: 0,
            rank: 0,
            attribute,
            type_kind,
            offset: None,
            span: 0,
            dims: [Dimension::EMPTY; MAX_RANK],
        }
    }

    pub fn rank(&self) -> usize {
        self.rank as usize
    }

    pub fn dim(&self, k: usize) -> Option<&Dimension> {
        self.dims.get(..self.rank()).and_then(|s| s.get(k))
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.dims[..self.rank()]
    }

    pub fn dims_mut(&mut self) -> &mut [Dimension] {
        let rank = self.rank();
        &mut self.dims[..rank]
    }

    /// Total element count across all dimensions, treating rank 0 as 1
    /// element. Does not special-case the assumed-size sentinel; callers
    /// that might see `extent == -1` in the last dimension must check
    /// [`Dimension::is_assumed_size`] first.
    pub fn element_count(&self) -> i64 {
        if self.rank == 0 {
            1
        } else {
            self.dims().iter().map(|d| d.extent.max(0)).product()
        }
    }

    pub fn byte_size(&self) -> i64 {
        self.element_count() * self.elem_len as i64
    }

    /// `spec.md` §4.A `is_contiguous`: a tri-state because rank<0 or a null
    /// base pointer is a distinct answer from "no, not contiguous".
    pub fn is_contiguous(&self) -> Contiguity {
        contiguity::is_contiguous(self)
    }

    /// Validates the stride invariants from `spec.md` §3:
    /// `|stride[0]| >= elem_len` and, for `k < rank-1`,
    /// `|stride[k+1]| >= |stride[k]| * extent[k]`.
    pub fn check_invariants(&self) -> Result<(), CafError> {
        ops::check_invariants(self)
    }

    /// Byte address of element at the given zero-based multi-index,
    /// relative to `lower_bound` per dimension.
    pub fn element_address(&self, index: &[i64]) -> Result<*mut u8, CafError> {
        ops::element_address(self, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contiguous_1d(n: i64, elem_len: usize) -> Descriptor {
        let mut d = Descriptor::scalar(
            std::ptr::null_mut(),
            elem_len,
            TypeKind::new(BaseType::Integer, elem_len as i32),
            Attribute::Allocatable,
        );
        d.rank = 1;
        d.dims_mut()[0] = Dimension {
            lower_bound: 1,
            extent: n,
            stride_bytes: elem_len as isize,
        };
        d
    }

    #[test]
    fn scalar_has_one_element() {
        let d = Descriptor::scalar(
            std::ptr::null_mut(),
            4,
            TypeKind::new(BaseType::Integer, 4),
            Attribute::Other,
        );
        assert_eq!(d.element_count(), 1);
        assert_eq!(d.is_contiguous(), Contiguity::Contiguous);
    }

    #[test]
    fn contiguous_vector_is_contiguous() {
        let d = contiguous_1d(10, 4);
        assert_eq!(d.is_contiguous(), Contiguity::Contiguous);
        assert!(d.check_invariants().is_ok());
    }

    #[test]
    fn strided_vector_is_not_contiguous() {
        let mut d = contiguous_1d(10, 4);
        d.dims_mut()[0].stride_bytes = 8;
        assert_eq!(d.is_contiguous(), Contiguity::NonContiguous);
        assert!(d.check_invariants().is_ok());
    }

    #[test]
    fn invalid_stride_violates_invariant() {
        let mut d = contiguous_1d(10, 4);
        d.dims_mut()[0].stride_bytes = 2; // smaller than elem_len
        assert!(d.check_invariants().is_err());
    }

    #[test]
    fn assumed_size_sentinel_is_recognized() {
        let mut d = contiguous_1d(10, 4);
        d.dims_mut()[0].extent = -1;
        assert!(d.dims()[0].is_assumed_size());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn extents_strat() -> impl Strategy<Value = Vec<i64>> {
        prop::collection::vec(1i64..8, 1..=MAX_RANK)
    }

    fn build_contiguous(elem_len: usize, extents: &[i64]) -> Descriptor {
        let mut d = Descriptor::scalar(
            std::ptr::null_mut(),
            elem_len,
            TypeKind::new(BaseType::Integer, elem_len as i32),
            Attribute::Allocatable,
        );
        d.rank = extents.len() as u8;
        let mut stride = elem_len as isize;
        for (k, &extent) in extents.iter().enumerate() {
            d.dims_mut()[k] = Dimension {
                lower_bound: 1,
                extent,
                stride_bytes: stride,
            };
            stride = stride.saturating_mul(extent as isize);
        }
        d
    }

    proptest! {
        // A descriptor whose strides are exactly the running product of
        // the preceding extents always satisfies both the `spec.md` §3
        // stride invariant and `is_contiguous`, for any rank up to
        // MAX_RANK and any positive extents.
        #[test]
        fn column_major_layout_is_always_contiguous(extents in extents_strat()) {
            let d = build_contiguous(4, &extents);
            prop_assert_eq!(d.is_contiguous(), Contiguity::Contiguous);
            prop_assert!(d.check_invariants().is_ok());
            let expected: i64 = extents.iter().product();
            prop_assert_eq!(d.element_count(), expected);
        }

        // Doubling the outermost stride while leaving the rest of the
        // layout alone always breaks contiguity for rank >= 2, since the
        // invariant only ever requires stride[k+1] >= stride[k] * extent[k].
        #[test]
        fn widened_outer_stride_is_never_contiguous(extents in prop::collection::vec(1i64..8, 2..=MAX_RANK)) {
            let mut d = build_contiguous(4, &extents);
            let last = d.rank() - 1;
            d.dims_mut()[last].stride_bytes *= 2;
            prop_assert_eq!(d.is_contiguous(), Contiguity::NonContiguous);
        }
    }
}
