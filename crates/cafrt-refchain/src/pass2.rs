//! Pass 2 — transfer (`spec.md` §4.E).
//!
//! A single-pass descent that walks `Component` nodes to find the
//! remote base offset (switching to the global window at the first
//! component crossing), then, at the chain's one permitted array ref,
//! enumerates the selected elements in column-major order and moves each
//! one between the remote `(space, offset)` address and the local
//! destination/source descriptor.

use cafrt_core::CafError;
use cafrt_descriptor::{BaseType, Descriptor, TypeKind};
use cafrt_transfer::convert_element;

use crate::access::{RemoteAccess, Space};
use crate::node::{DimSelector, RefChain, RefNode};

/// Where the chain's traversal landed: the window space and byte offset at
/// the array ref (or at the chain's end, for a pure scalar reference).
struct Landing<'a> {
    space: Space,
    offset: isize,
    array_node: Option<&'a RefNode>,
}

fn walk_to_array<'a>(
    access: &dyn RemoteAccess,
    chain: RefChain<'a>,
) -> Result<Landing<'a>, CafError> {
    let mut space = Space::Named;
    let mut offset: isize = 0;
    for node in chain {
        match node {
            RefNode::Component {
                byte_offset,
                token_sub_offset,
            } => {
                offset = offset.saturating_add(*byte_offset);
                if *token_sub_offset > 0 {
                    let target = offset.saturating_add(*token_sub_offset);
                    offset = access.fetch_pointer(space, target)?;
                    space = Space::Global;
                }
            }
            RefNode::Array { .. } | RefNode::StaticArray { .. } => {
                return Ok(Landing {
                    space,
                    offset,
                    array_node: Some(node),
                });
            }
        }
    }
    Ok(Landing {
        space,
        offset,
        array_node: None,
    })
}

/// One remote element's resolved byte offset paired with its position in
/// the destination's column-major enumeration.
struct ElementPlan {
    remote_offset: isize,
    dst_index: usize,
}

/// Resolves the list of elements named by the chain's array ref (or the
/// single scalar element, if there is none), in column-major order.
fn resolve_elements(
    access: &dyn RemoteAccess,
    landing: &Landing<'_>,
) -> Result<(Vec<ElementPlan>, TypeKind, usize), CafError> {
    match landing.array_node {
        None => Ok((
            vec![ElementPlan {
                remote_offset: landing.offset,
                dst_index: 0,
            }],
            TypeKind::new(BaseType::Integer, 0),
            0,
        )),
        Some(RefNode::Array { dims, item_size }) => {
            let remote_desc = access.fetch_descriptor(landing.space, landing.offset)?;
            let plans = enumerate_descriptor_dims(dims, &remote_desc, landing.offset)?;
            Ok((plans, remote_desc.type_kind, *item_size))
        }
        Some(RefNode::StaticArray {
            dims,
            item_size,
            element_len,
        }) => {
            let plans = enumerate_static_dims(dims, *item_size, landing.offset)?;
            Ok((
                plans,
                TypeKind::new(BaseType::Integer, *element_len as i32),
                *item_size,
            ))
        }
        Some(RefNode::Component { .. }) => unreachable!("walk_to_array only returns array nodes"),
    }
}

fn enumerate_descriptor_dims(
    dims: &[DimSelector],
    remote: &Descriptor,
    base_offset: isize,
) -> Result<Vec<ElementPlan>, CafError> {
    if dims.len() != remote.rank() {
        return Err(CafError::InvalidRank);
    }
    let mut axes: Vec<Vec<i64>> = Vec::with_capacity(dims.len());
    let mut strides: Vec<isize> = Vec::with_capacity(dims.len());
    let mut lowers: Vec<i64> = Vec::with_capacity(dims.len());
    for (sel, dim) in dims.iter().zip(remote.dims()) {
        let (positions, skip) = selector_positions(sel, dim.lower_bound, dim.upper_bound())?;
        if skip {
            continue;
        }
        axes.push(positions);
        strides.push(dim.stride_bytes);
        lowers.push(dim.lower_bound);
    }
    Ok(cartesian_offsets(&axes, &strides, &lowers, base_offset))
}

fn enumerate_static_dims(
    dims: &[DimSelector],
    item_size: usize,
    base_offset: isize,
) -> Result<Vec<ElementPlan>, CafError> {
    let mut axes: Vec<Vec<i64>> = Vec::with_capacity(dims.len());
    let mut strides: Vec<isize> = Vec::with_capacity(dims.len());
    let mut lowers: Vec<i64> = Vec::with_capacity(dims.len());
    let mut running_stride = item_size as isize;
    for sel in dims {
        // A static array's bounds come from the selector itself, not a
        // remote descriptor (`spec.md` §4.E "StaticArray: as Array, but
        // extents come from the node itself").
        let lower = selector_lower_bound(sel)?;
        let upper = selector_upper_bound(sel)?;
        let (positions, skip) = selector_positions(sel, lower, upper)?;
        if skip {
            continue;
        }
        let extent = (upper - lower + 1).max(0);
        axes.push(positions);
        strides.push(running_stride);
        lowers.push(lower);
        running_stride = running_stride.saturating_mul(extent.max(1) as isize);
    }
    Ok(cartesian_offsets(&axes, &strides, &lowers, base_offset))
}

/// Builds the full cartesian product of per-axis integer positions into
/// byte offsets, in column-major order (first axis varies fastest,
/// matching `Descriptor`'s stride convention).
fn cartesian_offsets(
    axes: &[Vec<i64>],
    strides: &[isize],
    lowers: &[i64],
    base_offset: isize,
) -> Vec<ElementPlan> {
    let total: usize = axes.iter().map(|a| a.len()).product::<usize>().max(if axes.is_empty() { 1 } else { 0 });
    let mut out = Vec::with_capacity(total);
    if axes.is_empty() {
        out.push(ElementPlan {
            remote_offset: base_offset,
            dst_index: 0,
        });
        return out;
    }
    let mut counters = vec![0usize; axes.len()];
    let mut dst_index = 0usize;
    loop {
        if axes.iter().any(|a| a.is_empty()) {
            break;
        }
        let mut offset = base_offset;
        for (k, &c) in counters.iter().enumerate() {
            let pos = axes[k][c];
            offset =
                offset.saturating_add(((pos - lowers[k]) as isize).saturating_mul(strides[k]));
        }
        out.push(ElementPlan {
            remote_offset: offset,
            dst_index,
        });
        dst_index += 1;

        let mut k = 0;
        loop {
            if k == counters.len() {
                return out;
            }
            counters[k] += 1;
            if counters[k] < axes[k].len() {
                break;
            }
            counters[k] = 0;
            k += 1;
        }
    }
    out
}

/// `(positions, skip)`: `skip = true` for a rank-reducing selector that
/// does not contribute a destination dimension at all (still consumes
/// exactly one position in the source).
fn selector_positions(
    sel: &DimSelector,
    lower: i64,
    upper: i64,
) -> Result<(Vec<i64>, bool), CafError> {
    match sel {
        DimSelector::None => Ok(((lower..=upper).collect(), false)),
        DimSelector::Full { stride } => {
            if *stride == 0 {
                Ok((vec![lower], true))
            } else if *stride > 0 {
                Ok((step_range(lower, upper, *stride), false))
            } else {
                Ok((step_range(upper, lower, -stride), false))
            }
        }
        DimSelector::Single { index } => {
            if *index < lower || *index > upper {
                return Err(CafError::OutOfBounds);
            }
            Ok((vec![*index], true))
        }
        DimSelector::Range { start, end, stride } => {
            if *start < lower || *end > upper {
                return Err(CafError::OutOfBounds);
            }
            if *stride == 0 {
                Ok((vec![*start], true))
            } else if *stride > 0 {
                Ok((step_range(*start, *end, *stride), false))
            } else {
                Ok((step_range(*end, *start, -stride), false))
            }
        }
        DimSelector::OpenEnd { start, stride } => {
            if *start < lower || *start > upper {
                return Err(CafError::OutOfBounds);
            }
            Ok((step_range(*start, upper, stride.max(1)), false))
        }
        DimSelector::OpenStart { end, stride } => {
            if *end < lower || *end > upper {
                return Err(CafError::OutOfBounds);
            }
            Ok((step_range(lower, *end, stride.max(1)), false))
        }
        DimSelector::Vector { indices, .. } => {
            for &i in indices {
                if i < lower || i > upper {
                    return Err(CafError::OutOfBounds);
                }
            }
            Ok((indices.clone(), false))
        }
    }
}

fn step_range(start: i64, end: i64, stride: i64) -> Vec<i64> {
    if stride <= 0 || end < start {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut i = start;
    while i <= end {
        out.push(i);
        i += stride;
    }
    out
}

fn selector_lower_bound(sel: &DimSelector) -> Result<i64, CafError> {
    match sel {
        DimSelector::Range { start, .. } => Ok(*start),
        DimSelector::OpenStart { .. } | DimSelector::Full { .. } | DimSelector::None => Ok(0),
        DimSelector::Single { index } => Ok(*index),
        DimSelector::OpenEnd { start, .. } => Ok(*start),
        DimSelector::Vector { indices, .. } => Ok(*indices.iter().min().unwrap_or(&0)),
    }
}

fn selector_upper_bound(sel: &DimSelector) -> Result<i64, CafError> {
    match sel {
        DimSelector::Range { end, .. } => Ok(*end),
        DimSelector::OpenEnd { .. } | DimSelector::Full { .. } | DimSelector::None => {
            Err(CafError::InvalidExtent)
        }
        DimSelector::Single { index } => Ok(*index),
        DimSelector::OpenStart { end, .. } => Ok(*end),
        DimSelector::Vector { indices, .. } => Ok(*indices.iter().max().unwrap_or(&0)),
    }
}

/// `spec.md` §4.E `get_by_ref`: copies the elements named by `chain` from
/// the remote image into `dst`, which the caller has already shaped to
/// match the [`crate::pass1::Shape`] computed for this chain.
pub fn get_by_ref(
    access: &dyn RemoteAccess,
    chain: RefChain<'_>,
    dst: &mut Descriptor,
) -> Result<(), CafError> {
    let landing = walk_to_array(access, chain)?;
    let (plans, remote_kind, _item_size) = resolve_elements(access, &landing)?;
    let dst_indices = dst_column_major_indices(dst, plans.len())?;

    for plan in &plans {
        let addr = dst.element_address(&dst_indices[plan.dst_index])?;
        let mut staged = vec![0u8; remote_kind.elem_len().max(dst.elem_len)];
        access.get_bytes(landing.space, plan.remote_offset, &mut staged[..remote_kind.elem_len().max(1)])?;
        let dst_bytes = unsafe { std::slice::from_raw_parts_mut(addr, dst.elem_len) };
        if remote_kind == dst.type_kind || remote_kind.elem_len() == 0 {
            let n = dst.elem_len.min(staged.len());
            dst_bytes[..n].copy_from_slice(&staged[..n]);
        } else {
            convert_element(remote_kind, &staged, dst.type_kind, dst_bytes)?;
        }
    }
    Ok(())
}

/// `spec.md` §4.E `send_by_ref`: the mirror image of [`get_by_ref`], moving
/// bytes from `src` to the remote image.
pub fn send_by_ref(
    access: &dyn RemoteAccess,
    chain: RefChain<'_>,
    src: &Descriptor,
) -> Result<(), CafError> {
    let landing = walk_to_array(access, chain)?;
    let (plans, remote_kind, _item_size) = resolve_elements(access, &landing)?;
    let src_indices = dst_column_major_indices(src, plans.len())?;
    let elem_len = remote_kind.elem_len().max(src.elem_len).max(1);

    for plan in &plans {
        let addr = src.element_address(&src_indices[plan.dst_index])?;
        let src_bytes = unsafe { std::slice::from_raw_parts(addr, src.elem_len) };
        let mut staged = vec![0u8; elem_len];
        if remote_kind == src.type_kind || remote_kind.elem_len() == 0 {
            let n = src.elem_len.min(staged.len());
            staged[..n].copy_from_slice(&src_bytes[..n]);
        } else {
            convert_element(src.type_kind, src_bytes, remote_kind, &mut staged)?;
        }
        access.put_bytes(landing.space, plan.remote_offset, &staged[..remote_kind.elem_len().max(1)])?;
    }
    Ok(())
}

/// Enumerates `count` column-major multi-indices over `d`'s current shape;
/// used to line up the destination/source element in lockstep with the
/// remote element list built by [`resolve_elements`].
fn dst_column_major_indices(d: &Descriptor, count: usize) -> Result<Vec<Vec<i64>>, CafError> {
    if d.rank() == 0 {
        return Ok(vec![vec![]; count.max(1)]);
    }
    let mut out = Vec::with_capacity(count);
    let mut counters = vec![0i64; d.rank()];
    for _ in 0..count {
        out.push(counters.clone());
        for (k, dim) in d.dims().iter().enumerate() {
            counters[k] += 1;
            if counters[k] < dim.extent.max(0) {
                break;
            }
            counters[k] = 0;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_range_basic() {
        assert_eq!(step_range(2, 10, 2), vec![2, 4, 6, 8, 10]);
        assert_eq!(step_range(1, 1, 1), vec![1]);
        assert_eq!(step_range(5, 1, 1), Vec::<i64>::new());
    }

    #[test]
    fn cartesian_offsets_single_axis_strided() {
        let axes = vec![vec![2i64, 4, 6, 8, 10]];
        let strides = vec![8isize]; // stride-2 elements of 4 bytes
        let lowers = vec![1i64];
        let plans = cartesian_offsets(&axes, &strides, &lowers, 0);
        let offsets: Vec<isize> = plans.iter().map(|p| p.remote_offset).collect();
        assert_eq!(offsets, vec![8, 24, 40, 56, 72]);
    }

    #[test]
    fn empty_vector_yields_no_elements() {
        let axes: Vec<Vec<i64>> = vec![vec![]];
        let strides = vec![4isize];
        let lowers = vec![1i64];
        let plans = cartesian_offsets(&axes, &strides, &lowers, 0);
        assert!(plans.is_empty());
    }
}
