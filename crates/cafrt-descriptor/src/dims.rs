/// One dimension record: `(lower_bound, extent, stride-in-bytes)`
/// (`spec.md` §3 "Descriptor").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimension {
    pub lower_bound: i64,
    /// `-1` is the assumed-size sentinel, valid only in the last dimension.
    pub extent: i64,
    pub stride_bytes: isize,
}

impl Dimension {
    pub const EMPTY: Dimension = Dimension {
        lower_bound: 0,
        extent: 0,
        stride_bytes: 0,
    };

    pub fn upper_bound(&self) -> i64 {
        self.lower_bound + self.extent - 1
    }

    pub fn is_assumed_size(&self) -> bool {
        self.extent == -1
    }

    /// A zero stride in a section ref requests rank reduction for this
    /// dimension; `spec.md` §3 requires `lower == upper` in that case.
    pub fn is_rank_reducing(&self) -> bool {
        self.stride_bytes == 0
    }
}
