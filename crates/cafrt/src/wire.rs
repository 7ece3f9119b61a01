//! Small integer-to-enum wire encodings shared across the ABI surface.
//! Each one is a direct mapping the compiler's code generator is expected
//! to emit literal constants for; none of them is part of any standard
//! descriptor format.

use std::os::raw::c_int;

use cafrt_core::{CafError, TeamLevel};
use cafrt_window::RegisterKind;

pub fn register_kind_from_wire(kind: c_int) -> Result<RegisterKind, CafError> {
    match kind {
        0 => Ok(RegisterKind::Static),
        1 => Ok(RegisterKind::Allocatable),
        2 => Ok(RegisterKind::LockStatic),
        3 => Ok(RegisterKind::LockAlloc),
        4 => Ok(RegisterKind::Critical),
        5 => Ok(RegisterKind::EventStatic),
        6 => Ok(RegisterKind::EventAlloc),
        7 => Ok(RegisterKind::ComponentRegisterOnly),
        8 => Ok(RegisterKind::ComponentAllocateOnly),
        _ => Err(CafError::InvalidAttribute),
    }
}

/// `get_team(level)`'s argument encoding.
pub fn team_level_from_wire(level: c_int) -> TeamLevel {
    match level {
        1 => TeamLevel::Parent,
        2 => TeamLevel::Current,
        _ => TeamLevel::Initial,
    }
}
