//! Maps a descriptor's `(base_type, kind)` to the `MPI_Datatype` the
//! collective operations reduce/broadcast over (`spec.md` §4.G
//! "map descriptor type to an MPI datatype").

use cafrt_core::CafError;
use cafrt_descriptor::{BaseType, TypeKind};
use mpi::ffi;

pub fn to_mpi_datatype(tk: TypeKind) -> Result<ffi::MPI_Datatype, CafError> {
    match (tk.base, tk.kind) {
        (BaseType::Integer, 1) => Ok(ffi::RSMPI_INT8_T),
        (BaseType::Integer, 2) => Ok(ffi::RSMPI_INT16_T),
        (BaseType::Integer, 4) => Ok(ffi::RSMPI_INT32_T),
        (BaseType::Integer, 8) => Ok(ffi::RSMPI_INT64_T),
        (BaseType::Logical, 4) => Ok(ffi::RSMPI_INT32_T),
        (BaseType::Real, 4) => Ok(ffi::RSMPI_FLOAT),
        (BaseType::Real, 8) => Ok(ffi::RSMPI_DOUBLE),
        (BaseType::Character, 1) => Ok(ffi::RSMPI_BYTE),
        // Complex and wide character kinds have no single scalar MPI
        // datatype; callers reduce/broadcast them as raw byte blocks
        // instead (`spec.md` §4.G falls back to the byte-wise path for
        // anything not covered here).
        _ => Err(CafError::InvalidType),
    }
}
