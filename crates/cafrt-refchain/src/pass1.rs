//! Pass 1 — shape and allocation (`spec.md` §4.E).
//!
//! Walks the chain once to compute the element count, the destination's
//! expected rank/extents, and whether the destination needs (or, for
//! `send_by_ref`, would need) reallocation. Also tracks the two
//! global-window crossing flags that pass 2 uses to decide where a remote
//! array ref's descriptor comes from.

use cafrt_core::CafError;
use smallvec::SmallVec;

use crate::node::{array_ref_count, DimSelector, RefChain, RefNode};

const INLINE_DIMS: usize = 8;

/// Result of pass 1: enough information to allocate/validate the
/// destination before pass 2 actually moves bytes.
#[derive(Clone, Debug, Default)]
pub struct Shape {
    pub extents: SmallVec<[i64; INLINE_DIMS]>,
    pub element_count: i64,
    /// Set once the traversal has crossed into a component token reached
    /// through the global dynamic window (`spec.md` §4.E "Pass 1").
    pub access_data_through_global_win: bool,
    /// Set after a *second* such crossing.
    pub access_desc_through_global_win: bool,
    pub needs_realloc: bool,
}

impl Shape {
    pub fn rank(&self) -> usize {
        self.extents.len()
    }
}

/// Runs pass 1 over `chain`. `dst_rank`/`dst_extents` describe the caller's
/// current destination shape; `dst_reallocatable` controls whether a rank
/// or extent mismatch triggers reallocation (get) or a fatal error (send
/// into a non-reallocatable destination, per `spec.md` §4.E).
pub fn run(
    chain: RefChain<'_>,
    dst_rank: usize,
    dst_extents: &[i64],
    dst_reallocatable: bool,
) -> Result<Shape, CafError> {
    if array_ref_count(chain) > 1 {
        return Err(CafError::Fatal(
            "reference chain has more than one array ref".into(),
        ));
    }

    let mut shape = Shape {
        element_count: 1,
        ..Default::default()
    };
    let mut crossings = 0u8;

    for node in chain {
        match node {
            RefNode::Component { token_sub_offset, .. } => {
                if *token_sub_offset > 0 {
                    crossings += 1;
                    match crossings {
                        1 => shape.access_data_through_global_win = true,
                        _ => shape.access_desc_through_global_win = true,
                    }
                }
            }
            RefNode::Array { dims, .. } | RefNode::StaticArray { dims, .. } => {
                for dim in dims {
                    if let Some(extent) = dim_extent(dim)? {
                        shape.extents.push(extent);
                        shape.element_count = shape
                            .element_count
                            .checked_mul(extent.max(0))
                            .ok_or(CafError::InvalidExtent)?;
                    }
                    // `Single` (and any rank-reducing triplet) consumes the
                    // source dimension without contributing a destination
                    // dimension (`spec.md` §4.E "a rank-reducing Single in a
                    // dim skips the destination dim").
                }
            }
        }
    }

    if shape.rank() != dst_rank || shape.extents.iter().zip(dst_extents).any(|(a, b)| a != b) {
        if dst_reallocatable {
            shape.needs_realloc = true;
        } else {
            return Err(CafError::InvalidRank);
        }
    }

    Ok(shape)
}

/// Returns `Some(extent)` for a dimension that contributes to the
/// destination rank, or `None` for a rank-reducing `Single`.
fn dim_extent(dim: &DimSelector) -> Result<Option<i64>, CafError> {
    match dim {
        DimSelector::None => Ok(None),
        DimSelector::Single { .. } => Ok(None),
        DimSelector::Full { stride } => {
            if *stride == 0 {
                Ok(None)
            } else {
                // A bare `Full` carries no bound information of its own;
                // the caller resolves its extent from the remote
                // descriptor in pass 2. Pass 1 reserves the destination
                // dimension with a placeholder that pass 2 overwrites.
                Ok(Some(-1))
            }
        }
        DimSelector::Range { start, end, stride } => {
            if *stride == 0 {
                if start != end {
                    return Err(CafError::InvalidExtent);
                }
                Ok(None)
            } else if *stride > 0 {
                if end < start {
                    return Ok(Some(0));
                }
                Ok(Some((end - start) / stride + 1))
            } else {
                if end > start {
                    return Ok(Some(0));
                }
                Ok(Some((start - end) / (-stride) + 1))
            }
        }
        DimSelector::OpenEnd { .. } | DimSelector::OpenStart { .. } => Ok(Some(-1)),
        DimSelector::Vector { indices, .. } => Ok(Some(indices.len() as i64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::RefNode;

    #[test]
    fn full_dim_reserves_destination_rank() {
        let chain = vec![RefNode::Array {
            dims: vec![DimSelector::Full { stride: 1 }],
            item_size: 4,
        }];
        let shape = run(&chain, 0, &[], true).unwrap();
        assert_eq!(shape.rank(), 1);
        assert!(shape.needs_realloc);
    }

    #[test]
    fn vector_subscript_extent_is_vector_length() {
        let chain = vec![RefNode::Array {
            dims: vec![DimSelector::Vector {
                indices: vec![2, 4, 6, 8, 10],
                kind: 4,
            }],
            item_size: 4,
        }];
        let shape = run(&chain, 1, &[5], false).unwrap();
        assert_eq!(shape.element_count, 5);
        assert!(!shape.needs_realloc);
    }

    #[test]
    fn rank_mismatch_into_non_reallocatable_is_error() {
        let chain = vec![RefNode::Array {
            dims: vec![DimSelector::Range {
                start: 1,
                end: 10,
                stride: 1,
            }],
            item_size: 4,
        }];
        assert!(run(&chain, 2, &[1, 1], false).is_err());
    }

    #[test]
    fn double_array_ref_is_rejected() {
        let chain = vec![
            RefNode::Array {
                dims: vec![DimSelector::Full { stride: 1 }],
                item_size: 4,
            },
            RefNode::Array {
                dims: vec![DimSelector::Full { stride: 1 }],
                item_size: 4,
            },
        ];
        assert!(run(&chain, 1, &[1], true).is_err());
    }

    #[test]
    fn rank_reducing_single_skips_destination_dim() {
        let chain = vec![RefNode::Array {
            dims: vec![
                DimSelector::Single { index: 2 },
                DimSelector::Full { stride: 1 },
            ],
            item_size: 4,
        }];
        let shape = run(&chain, 1, &[10], true).unwrap();
        assert_eq!(shape.rank(), 1);
    }

    #[test]
    fn zero_length_vector_transfers_nothing() {
        let chain = vec![RefNode::Array {
            dims: vec![DimSelector::Vector {
                indices: vec![],
                kind: 4,
            }],
            item_size: 4,
        }];
        let shape = run(&chain, 1, &[0], true).unwrap();
        assert_eq!(shape.element_count, 0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::node::RefNode;
    use proptest::prelude::*;

    proptest! {
        // A single positive-stride Range dim always reports the same
        // element count pass 1 computes by hand: the usual Fortran
        // triplet extent formula `(end - start) / stride + 1`.
        #[test]
        fn ascending_range_extent_matches_triplet_formula(
            start in -20i64..20,
            len in 0i64..30,
            stride in 1i64..5,
        ) {
            let end = start + len * stride;
            let chain = vec![RefNode::Array {
                dims: vec![DimSelector::Range { start, end, stride }],
                item_size: 4,
            }];
            let shape = run(&chain, 1, &[len + 1], false).unwrap();
            prop_assert_eq!(shape.rank(), 1);
            prop_assert_eq!(shape.element_count, len + 1);
            prop_assert!(!shape.needs_realloc);
        }

        // Stacking N rank-reducing Single selectors ahead of one Full dim
        // always yields a destination of rank 1, regardless of how many
        // Singles precede it or what indices they name.
        #[test]
        fn singles_never_contribute_to_destination_rank(indices in prop::collection::vec(-5i64..5, 0..6)) {
            let mut dims: Vec<DimSelector> = indices
                .iter()
                .map(|&index| DimSelector::Single { index })
                .collect();
            dims.push(DimSelector::Full { stride: 1 });
            let chain = vec![RefNode::Array { dims, item_size: 4 }];
            let shape = run(&chain, 0, &[], true).unwrap();
            prop_assert_eq!(shape.rank(), 1);
        }
    }
}
