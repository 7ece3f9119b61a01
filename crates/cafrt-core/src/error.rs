use crate::status;

/// The runtime's internal error type.
///
/// Every fallible Rust-facing call in the workspace returns
/// `Result<T, CafError>`; the ABI layer in `cafrt` is the single place that
/// collapses this back down to a `stat` integer and an optional `errmsg`
/// buffer, matching the three-tier error model in `spec.md` §7.
#[derive(thiserror::Error, Debug)]
pub enum CafError {
    #[error("base address is null")]
    BaseAddrNull,
    #[error("base address is not null but was expected to be")]
    BaseAddrNotNull,
    #[error("invalid element length")]
    InvalidElemLen,
    #[error("invalid rank")]
    InvalidRank,
    #[error("invalid type")]
    InvalidType,
    #[error("invalid attribute")]
    InvalidAttribute,
    #[error("invalid extent")]
    InvalidExtent,
    #[error("invalid stride")]
    InvalidStride,
    #[error("invalid descriptor")]
    InvalidDescriptor,
    #[error("memory allocation failed")]
    MemAllocation,
    #[error("subscript out of bounds")]
    OutOfBounds,
    #[error("duplicate image in sync_images list")]
    DupSyncImages,
    #[error("image {0} has stopped")]
    StoppedImage(i32),
    #[error("image {0} has failed")]
    FailedImage(i32),
    #[error("mpi error, class {0}")]
    Mpi(i32),
    #[error("internal invariant violated: {0}")]
    Fatal(String),
}

impl CafError {
    /// Maps an error to the `stat` integer it is reported through, per
    /// `spec.md` §6's status code table.
    pub fn to_stat(&self) -> i32 {
        match self {
            CafError::BaseAddrNull => status::ERROR_BASE_ADDR_NULL,
            CafError::BaseAddrNotNull => status::ERROR_BASE_ADDR_NOT_NULL,
            CafError::InvalidElemLen => status::INVALID_ELEM_LEN,
            CafError::InvalidRank => status::INVALID_RANK,
            CafError::InvalidType => status::INVALID_TYPE,
            CafError::InvalidAttribute => status::INVALID_ATTRIBUTE,
            CafError::InvalidExtent => status::INVALID_EXTENT,
            CafError::InvalidStride => status::INVALID_STRIDE,
            CafError::InvalidDescriptor => status::INVALID_DESCRIPTOR,
            CafError::MemAllocation => status::ERROR_MEM_ALLOCATION,
            CafError::OutOfBounds => status::ERROR_OUT_OF_BOUNDS,
            CafError::DupSyncImages => status::STAT_DUP_SYNC_IMAGES,
            CafError::StoppedImage(_) => status::STAT_STOPPED_IMAGE,
            CafError::FailedImage(_) => status::STAT_FAILED_IMAGE,
            CafError::Mpi(class) => *class,
            CafError::Fatal(_) => status::FAILURE,
        }
    }

    /// Tier classification from `spec.md` §7: `true` for tier-3 invariant
    /// violations that must abort the process when the caller did not pass
    /// a `stat` argument.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CafError::Fatal(_) | CafError::InvalidDescriptor)
    }
}

pub type CafResult<T> = Result<T, CafError>;
