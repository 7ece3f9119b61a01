use cafrt_core::CafError;

use crate::Descriptor;

/// Checks the two stride invariants from `spec.md` §3 and the
/// rank-reduction/assumed-size side conditions.
pub(crate) fn check_invariants(d: &Descriptor) -> Result<(), CafError> {
    if d.rank() > crate::MAX_RANK {
        return Err(CafError::InvalidRank);
    }
    let dims = d.dims();
    if dims.is_empty() {
        return Ok(());
    }
    if (dims[0].stride_bytes.unsigned_abs() as usize) < d.elem_len {
        return Err(CafError::InvalidStride);
    }
    for k in 0..dims.len() {
        if dims[k].is_rank_reducing() && dims[k].lower_bound != dims[k].upper_bound() {
            return Err(CafError::InvalidExtent);
        }
        if k + 1 < dims.len() {
            let this_extent = dims[k].extent;
            if this_extent == -1 && k + 1 != dims.len() - 1 {
                // assumed-size sentinel only valid in the last dimension
                return Err(CafError::InvalidExtent);
            }
            let min_next = dims[k].stride_bytes.unsigned_abs() * this_extent.max(0) as usize;
            if (dims[k + 1].stride_bytes.unsigned_abs() as usize) < min_next {
                return Err(CafError::InvalidStride);
            }
        }
    }
    Ok(())
}

/// Computes the byte address of `index` (zero-based positions relative to
/// each dimension's lower bound) via the canonical column-major reduction.
pub(crate) fn element_address(d: &Descriptor, index: &[i64]) -> Result<*mut u8, CafError> {
    if d.base.is_null() {
        return Err(CafError::BaseAddrNull);
    }
    if index.len() != d.rank() {
        return Err(CafError::InvalidRank);
    }
    let mut offset: isize = 0;
    for (dim, &i) in d.dims().iter().zip(index) {
        if i < 0 || (!dim.is_assumed_size() && i >= dim.extent) {
            return Err(CafError::OutOfBounds);
        }
        offset = offset.saturating_add((i as isize).saturating_mul(dim.stride_bytes));
    }
    // SAFETY: offset is a pure arithmetic computation; the caller owns the
    // decision of whether to dereference the resulting pointer.
    Ok(unsafe { d.base.offset(offset) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attribute, BaseType, Descriptor, TypeKind};

    #[test]
    fn element_address_2d() {
        let buf = [0u8; 64];
        let base = buf.as_ptr() as *mut u8;
        let mut d = Descriptor::scalar(base, 4, TypeKind::new(BaseType::Integer, 4), Attribute::Other);
        d.rank = 2;
        d.dims_mut()[0] = crate::Dimension {
            lower_bound: 1,
            extent: 4,
            stride_bytes: 4,
        };
        d.dims_mut()[1] = crate::Dimension {
            lower_bound: 1,
            extent: 4,
            stride_bytes: 16,
        };
        let addr = element_address(&d, &[1, 1]).unwrap();
        let expected = unsafe { base.offset(4 + 16) };
        assert_eq!(addr, expected);
    }

    #[test]
    fn out_of_bounds_index_is_rejected() {
        let buf = [0u8; 16];
        let base = buf.as_ptr() as *mut u8;
        let mut d = Descriptor::scalar(base, 4, TypeKind::new(BaseType::Integer, 4), Attribute::Other);
        d.rank = 1;
        d.dims_mut()[0] = crate::Dimension {
            lower_bound: 1,
            extent: 4,
            stride_bytes: 4,
        };
        assert!(matches!(element_address(&d, &[4]), Err(CafError::OutOfBounds)));
    }
}
