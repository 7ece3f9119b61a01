//! Status codes shared across the ABI surface (`spec.md` §6).
//!
//! These mirror the Fortran 2008 `STAT_*` constants and the runtime's own
//! `ERROR_*`/`INVALID_*` extensions, kept numerically stable because the
//! compiler-generated call sites compare against them directly.

/// Successful completion of an operation that reports through `stat`.
pub const SUCCESS: i32 = 1;
/// Generic failure with no more specific code available.
pub const FAILURE: i32 = 0;
pub const ERROR_BASE_ADDR_NULL: i32 = 2;
pub const ERROR_BASE_ADDR_NOT_NULL: i32 = 3;
pub const INVALID_ELEM_LEN: i32 = 4;
pub const INVALID_RANK: i32 = 5;
pub const INVALID_TYPE: i32 = 6;
pub const INVALID_ATTRIBUTE: i32 = 7;
pub const INVALID_EXTENT: i32 = 8;
pub const INVALID_STRIDE: i32 = 9;
pub const INVALID_DESCRIPTOR: i32 = 10;
pub const ERROR_MEM_ALLOCATION: i32 = 11;
pub const ERROR_OUT_OF_BOUNDS: i32 = 12;

pub const STAT_STOPPED_IMAGE: i32 = 6000;
pub const STAT_FAILED_IMAGE: i32 = 6001;

pub const STAT_LOCKED: i32 = 1;
pub const STAT_UNLOCKED: i32 = 0;
pub const STAT_LOCKED_OTHER_IMAGE: i32 = 2;
pub const STAT_DUP_SYNC_IMAGES: i32 = 3;

/// The observable state of a peer image (`spec.md` §7 tier 2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageStatus {
    Alive,
    Stopped,
    Failed,
}

impl ImageStatus {
    /// Encodes to the same small integer broadcast on the image-status window.
    pub fn to_wire(self) -> u8 {
        match self {
            ImageStatus::Alive => 0,
            ImageStatus::Stopped => 1,
            ImageStatus::Failed => 2,
        }
    }

    pub fn from_wire(byte: u8) -> Self {
        match byte {
            1 => ImageStatus::Stopped,
            2 => ImageStatus::Failed,
            _ => ImageStatus::Alive,
        }
    }
}
