//! Column-major multi-index iteration and the element-by-element staging
//! buffer used by the transfer engine's fallback path (`spec.md` §4.D
//! decision-ladder step 4).

use cafrt_descriptor::Dimension;
use smallvec::SmallVec;

/// Inline-capacity staging buffer for one element; spills to the heap for
/// element lengths beyond the inline capacity (the `alloca`-with-heap-spill
/// idiom from `original_source/src/mpi/helper.c`, expressed as a growable
/// `SmallVec` rather than a raw `alloca`).
pub type StagingBuffer = SmallVec<[u8; 32]>;

pub fn staging_buffer(len: usize) -> StagingBuffer {
    let mut buf = SmallVec::with_capacity(len);
    buf.resize(len, 0);
    buf
}

/// Iterates every zero-based multi-index of an array described by `dims`,
/// in Fortran column-major order (fastest-varying first dimension) —
/// matching the order `Descriptor`'s `stride_bytes` encodes.
pub fn column_major_indices(dims: &[Dimension]) -> ColumnMajorIndices<'_> {
    ColumnMajorIndices {
        dims,
        current: vec![0i64; dims.len()],
        done: dims.iter().any(|d| d.extent == 0),
    }
}

pub struct ColumnMajorIndices<'a> {
    dims: &'a [Dimension],
    current: Vec<i64>,
    done: bool,
}

impl<'a> Iterator for ColumnMajorIndices<'a> {
    type Item = Vec<i64>;

    fn next(&mut self) -> Option<Vec<i64>> {
        if self.done {
            return None;
        }
        if self.dims.is_empty() {
            self.done = true;
            return Some(Vec::new());
        }
        let out = self.current.clone();
        for (k, dim) in self.dims.iter().enumerate() {
            self.current[k] += 1;
            if self.current[k] < dim.extent.max(0) {
                return Some(out);
            }
            self.current[k] = 0;
        }
        self.done = true;
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_by_two_column_major_order() {
        let dims = [
            Dimension {
                lower_bound: 1,
                extent: 2,
                stride_bytes: 4,
            },
            Dimension {
                lower_bound: 1,
                extent: 2,
                stride_bytes: 8,
            },
        ];
        let all: Vec<Vec<i64>> = column_major_indices(&dims).collect();
        assert_eq!(
            all,
            vec![vec![0, 0], vec![1, 0], vec![0, 1], vec![1, 1]]
        );
    }

    #[test]
    fn scalar_yields_single_empty_index() {
        let all: Vec<Vec<i64>> = column_major_indices(&[]).collect();
        assert_eq!(all, vec![Vec::<i64>::new()]);
    }

    #[test]
    fn zero_extent_yields_nothing() {
        let dims = [Dimension {
            lower_bound: 1,
            extent: 0,
            stride_bytes: 4,
        }];
        assert_eq!(column_major_indices(&dims).count(), 0);
    }
}
