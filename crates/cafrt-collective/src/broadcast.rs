//! `co_broadcast` (`spec.md` §4.G).

use std::os::raw::c_void;

use cafrt_core::{CafError, ImageId};
use cafrt_descriptor::{BaseType, Descriptor};
use mpi::ffi;
use mpi::raw::AsRaw;
use mpi::topology::SimpleCommunicator;

/// `spec.md` §4.G `co_broadcast(a, source)`: broadcasts `a`'s bytes from
/// `source` to every other image on `comm`. Character arrays broadcast
/// their element length first, since the declared length can legitimately
/// differ between images' local descriptors before the call.
pub fn co_broadcast(
    comm: &SimpleCommunicator,
    desc: &mut Descriptor,
    buf: &mut [u8],
    source: ImageId,
) -> Result<(), CafError> {
    let raw = comm.as_raw();
    let root = source.as_rank();

    if desc.type_kind.base == BaseType::Character {
        let mut elem_len = desc.elem_len as i32;
        bcast_i32(raw, &mut elem_len, root)?;
        desc.elem_len = elem_len as usize;
    }

    let rc = unsafe {
        ffi::MPI_Bcast(
            buf.as_mut_ptr() as *mut c_void,
            buf.len() as i32,
            ffi::RSMPI_BYTE,
            root,
            raw,
        )
    };
    check(rc)
}

fn bcast_i32(comm: ffi::MPI_Comm, value: &mut i32, root: i32) -> Result<(), CafError> {
    let rc = unsafe {
        ffi::MPI_Bcast(value as *mut i32 as *mut c_void, 1, ffi::RSMPI_INT32_T, root, comm)
    };
    check(rc)
}

fn check(rc: i32) -> Result<(), CafError> {
    if rc == ffi::MPI_SUCCESS as i32 {
        Ok(())
    } else {
        Err(CafError::Mpi(rc))
    }
}
