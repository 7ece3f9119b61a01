//! The small ISO-descriptor-shaped utility surface `spec.md` §4.A calls out
//! as part of component A's local responsibility: `establish`, `allocate`,
//! `deallocate`, `address`, `section`, `select_part`, `set_pointer`.
//!
//! The *translation* between the two competing descriptor layouts these
//! utilities exist to serve is explicitly out of scope (`spec.md` §1); this
//! module only implements their effect on our own single [`Descriptor`]
//! representation, which is all the rest of the runtime ever needs.

use std::alloc::{alloc_zeroed, dealloc, Layout};

use cafrt_core::CafError;

use crate::{Attribute, Descriptor, Dimension, TypeKind, MAX_RANK};

/// Initializes `d` in place with the given rank/type/attribute and zeroed
/// dimensions; for `attribute == Pointer` all lower bounds are reset to `0`
/// per `spec.md` §3's pointer invariant.
pub fn establish(
    d: &mut Descriptor,
    base: *mut u8,
    elem_len: usize,
    type_kind: TypeKind,
    attribute: Attribute,
    rank: u8,
) -> Result<(), CafError> {
    if rank as usize > MAX_RANK {
        return Err(CafError::InvalidRank);
    }
    *d = Descriptor::scalar(base, elem_len, type_kind, attribute);
    d.rank = rank;
    if attribute == Attribute::Pointer {
        for dim in d.dims_mut() {
            dim.lower_bound = 0;
        }
    }
    Ok(())
}

/// Allocates storage for `d` sized by its current extents and attaches it
/// as the base address. `rank == 0` ignores any lower/upper bounds and
/// simply allocates one scalar slot (`spec.md` §8 boundary behavior).
pub fn allocate(d: &mut Descriptor) -> Result<(), CafError> {
    let count = d.element_count().max(1) as usize;
    let size = count.checked_mul(d.elem_len).ok_or(CafError::MemAllocation)?;
    if size == 0 {
        return Err(CafError::MemAllocation);
    }
    let layout = Layout::from_size_align(size, std::mem::align_of::<u64>())
        .map_err(|_| CafError::MemAllocation)?;
    // SAFETY: layout has non-zero size, checked above.
    let ptr = unsafe { alloc_zeroed(layout) };
    if ptr.is_null() {
        return Err(CafError::MemAllocation);
    }
    d.base = ptr;
    Ok(())
}

/// Frees storage previously obtained from [`allocate`]. Caller must ensure
/// `d` still describes the same size/alignment it was allocated with.
///
/// # Safety
/// `d.base` must have been returned by [`allocate`] on a descriptor with
/// the same element count and element length, and must not have been
/// freed already.
pub unsafe fn deallocate(d: &mut Descriptor) {
    if d.base.is_null() {
        return;
    }
    let count = d.element_count().max(1) as usize;
    let size = count * d.elem_len;
    if size > 0 {
        let layout = Layout::from_size_align_unchecked(size, std::mem::align_of::<u64>());
        dealloc(d.base, layout);
    }
    d.base = std::ptr::null_mut();
}

/// `spec.md` §4.A `address`: the byte address of one element.
pub fn address(d: &Descriptor, index: &[i64]) -> Result<*mut u8, CafError> {
    d.element_address(index)
}

/// Carves a section descriptor out of `source` given per-dimension
/// `(lower, upper, stride)` triplets. A `None` upper bound against an
/// assumed-size source dimension is an invalid-extent error, per the Open
/// Question resolution recorded in DESIGN.md.
pub fn section(
    source: &Descriptor,
    bounds: &[(i64, Option<i64>, i64)],
) -> Result<Descriptor, CafError> {
    if bounds.len() != source.rank() {
        return Err(CafError::InvalidRank);
    }
    let mut out = *source;
    out.rank = 0;
    let mut dims_out = Vec::with_capacity(bounds.len());
    for (dim, &(lower, upper, stride)) in source.dims().iter().zip(bounds) {
        let upper = match upper {
            Some(u) => u,
            None if dim.is_assumed_size() => return Err(CafError::InvalidExtent),
            None => dim.upper_bound(),
        };
        if stride == 0 && lower != upper {
            return Err(CafError::InvalidExtent);
        }
        let extent = if stride == 0 { 1 } else { (upper - lower) / stride + 1 };
        dims_out.push(Dimension {
            lower_bound: 0,
            extent,
            stride_bytes: dim.stride_bytes * stride as isize,
        });
    }
    out.rank = dims_out.len() as u8;
    let start_index: Vec<i64> = source
        .dims()
        .iter()
        .zip(bounds)
        .map(|(dim, &(lower, _, _))| lower - dim.lower_bound)
        .collect();
    let offset = source.element_address(&start_index)?;
    out.base = offset;
    for (i, dim) in dims_out.into_iter().enumerate() {
        out.dims_mut()[i] = dim;
    }
    Ok(out)
}

/// `spec.md` §4.A `select_part`: narrows `d` to a single component at
/// `byte_offset` with length `elem_len`, preserving rank/shape.
pub fn select_part(d: &Descriptor, byte_offset: isize, elem_len: usize) -> Descriptor {
    let mut out = *d;
    out.base = unsafe { d.base.offset(byte_offset) };
    out.elem_len = elem_len;
    out
}

/// `spec.md` §4.A `set_pointer`: repoints `d` at `base` without otherwise
/// touching its shape; used when a pointer component is associated with a
/// new target.
pub fn set_pointer(d: &mut Descriptor, base: *mut u8) {
    d.base = base;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BaseType, TypeKind};

    fn vector_descriptor(n: i64) -> Descriptor {
        let mut d = Descriptor::scalar(
            std::ptr::null_mut(),
            4,
            TypeKind::new(BaseType::Integer, 4),
            Attribute::Allocatable,
        );
        establish(
            &mut d,
            std::ptr::null_mut(),
            4,
            TypeKind::new(BaseType::Integer, 4),
            Attribute::Allocatable,
            1,
        )
        .unwrap();
        d.dims_mut()[0] = Dimension {
            lower_bound: 1,
            extent: n,
            stride_bytes: 4,
        };
        d
    }

    #[test]
    fn allocate_then_deallocate_roundtrip() {
        let mut d = vector_descriptor(8);
        allocate(&mut d).unwrap();
        assert!(!d.base.is_null());
        unsafe { deallocate(&mut d) };
        assert!(d.base.is_null());
    }

    #[test]
    fn rank_zero_allocate_is_one_slot() {
        let mut d = Descriptor::scalar(
            std::ptr::null_mut(),
            8,
            TypeKind::new(BaseType::Real, 8),
            Attribute::Allocatable,
        );
        allocate(&mut d).unwrap();
        assert!(!d.base.is_null());
        unsafe { deallocate(&mut d) };
    }

    #[test]
    fn section_with_stride_two_has_half_extent() {
        let mut src = vector_descriptor(10);
        allocate(&mut src).unwrap();
        let sec = section(&src, &[(2, Some(10), 2)]).unwrap();
        assert_eq!(sec.dims()[0].extent, 5);
        assert_eq!(sec.dims()[0].stride_bytes, 8);
        unsafe { deallocate(&mut src) };
    }

    #[test]
    fn section_rank_reduction_requires_equal_bounds() {
        let src = vector_descriptor(10);
        assert!(section(&src, &[(3, Some(5), 0)]).is_err());
        assert!(section(&src, &[(3, Some(3), 0)]).is_ok());
    }

    #[test]
    fn assumed_size_without_upper_is_invalid_extent() {
        let mut src = vector_descriptor(10);
        src.dims_mut()[0].extent = -1;
        assert!(matches!(
            section(&src, &[(1, None, 1)]),
            Err(CafError::InvalidExtent)
        ));
    }
}
