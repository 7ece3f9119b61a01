//! `co_reduce` / `co_min` / `co_max` / `co_sum` (`spec.md` §4.G).
//!
//! Contiguous descriptors reduce in one `MPI_Reduce` call; non-contiguous
//! ones loop element-by-element, gathering each element into a scratch
//! buffer first since `MPI_Reduce` needs contiguous origin/result buffers.
//! A user-supplied reduction constructs an `MPI_Op` from an adapter
//! function that calls back into the user's by-value/by-reference
//! reduction per pair of elements (`spec.md` §4.G, §9 "Global mutable
//! state" — the adapter's callback pointer is the one piece of genuinely
//! process-wide mutable state this crate introduces, guarded by the fact
//! that `co_reduce` suspends the calling thread for its whole duration).

use std::cell::Cell;
use std::os::raw::{c_int, c_void};

use cafrt_core::{CafError, ImageId};
use cafrt_descriptor::{Contiguity, Descriptor};
use mpi::ffi;
use mpi::raw::AsRaw;
use mpi::topology::SimpleCommunicator;

use crate::mpi_datatype::to_mpi_datatype;

/// A user-supplied element-wise reduction: `out = op(out, in)`, both
/// pointing at single elements of `elem_len` bytes.
pub type UserReduceFn = unsafe extern "C" fn(*mut c_void, *mut c_void, usize);

thread_local! {
    static ACTIVE_USER_OP: Cell<Option<(UserReduceFn, usize)>> = Cell::new(None);
}

pub fn co_sum(comm: &SimpleCommunicator, desc: &Descriptor, buf: &mut [u8], result_image: ImageId) -> Result<(), CafError> {
    reduce_builtin(comm, desc, buf, result_image, ffi::RSMPI_SUM)
}

pub fn co_min(comm: &SimpleCommunicator, desc: &Descriptor, buf: &mut [u8], result_image: ImageId) -> Result<(), CafError> {
    reduce_builtin(comm, desc, buf, result_image, ffi::RSMPI_MIN)
}

pub fn co_max(comm: &SimpleCommunicator, desc: &Descriptor, buf: &mut [u8], result_image: ImageId) -> Result<(), CafError> {
    reduce_builtin(comm, desc, buf, result_image, ffi::RSMPI_MAX)
}

fn reduce_builtin(
    comm: &SimpleCommunicator,
    desc: &Descriptor,
    buf: &mut [u8],
    result_image: ImageId,
    op: ffi::MPI_Op,
) -> Result<(), CafError> {
    let datatype = to_mpi_datatype(desc.type_kind)?;
    reduce_with_op(comm, desc, buf, result_image, datatype, op)
}

/// `spec.md` §4.G `co_reduce`: reduces with a user-supplied function,
/// registering it as a commutative `MPI_Op` for the duration of the call.
pub fn co_reduce(
    comm: &SimpleCommunicator,
    desc: &Descriptor,
    buf: &mut [u8],
    result_image: ImageId,
    user_fn: UserReduceFn,
) -> Result<(), CafError> {
    let elem_len = desc.elem_len;
    ACTIVE_USER_OP.with(|cell| cell.set(Some((user_fn, elem_len))));

    let mut user_op: ffi::MPI_Op = std::ptr::null_mut();
    let rc = unsafe { ffi::MPI_Op_create(Some(user_op_adapter), 0, &mut user_op) };
    let result = (|| {
        check(rc)?;
        reduce_with_op(comm, desc, buf, result_image, ffi::RSMPI_BYTE, user_op)
    })();

    if !user_op.is_null() {
        unsafe {
            ffi::MPI_Op_free(&mut user_op);
        }
    }
    ACTIVE_USER_OP.with(|cell| cell.set(None));
    result
}

/// The adapter `MPI_Op_create` invokes for each pair of elements in a
/// user reduction. MPI calls this back only from the calling thread
/// during the blocking `MPI_Reduce` issued by [`co_reduce`], so reading the
/// thread-local set just above is race-free.
unsafe extern "C" fn user_op_adapter(
    invec: *mut c_void,
    inoutvec: *mut c_void,
    len: *mut c_int,
    _datatype: *mut ffi::MPI_Datatype,
) {
    let Some((user_fn, elem_len)) = ACTIVE_USER_OP.with(|cell| cell.get()) else {
        return;
    };
    let count = unsafe { *len } as usize;
    for i in 0..count {
        let src = unsafe { (invec as *mut u8).add(i * elem_len) as *mut c_void };
        let dst = unsafe { (inoutvec as *mut u8).add(i * elem_len) as *mut c_void };
        unsafe { user_fn(dst, src, elem_len) };
    }
}

fn reduce_with_op(
    comm: &SimpleCommunicator,
    desc: &Descriptor,
    buf: &mut [u8],
    result_image: ImageId,
    datatype: ffi::MPI_Datatype,
    op: ffi::MPI_Op,
) -> Result<(), CafError> {
    let raw = comm.as_raw();
    let root = result_image.as_rank();
    let count = desc.element_count().max(0) as i32;

    if desc.is_contiguous() == Contiguity::Contiguous {
        let mut result = vec![0u8; buf.len()];
        let rc = unsafe {
            ffi::MPI_Reduce(
                buf.as_ptr() as *const c_void,
                result.as_mut_ptr() as *mut c_void,
                count,
                datatype,
                op,
                root,
                raw,
            )
        };
        check(rc)?;
        if comm.rank() == root {
            buf.copy_from_slice(&result);
        }
        return Ok(());
    }

    // Non-contiguous: reduce element-by-element, since MPI_Reduce needs a
    // contiguous origin buffer (`spec.md` §4.G "for non-contiguous,
    // element-wise loop").
    let elem_len = desc.elem_len;
    for i in 0..count as usize {
        let start = i * elem_len;
        let end = start + elem_len;
        let mut result = vec![0u8; elem_len];
        let rc = unsafe {
            ffi::MPI_Reduce(
                buf[start..end].as_ptr() as *const c_void,
                result.as_mut_ptr() as *mut c_void,
                1,
                datatype,
                op,
                root,
                raw,
            )
        };
        check(rc)?;
        if comm.rank() == root {
            buf[start..end].copy_from_slice(&result);
        }
    }
    Ok(())
}

fn check(rc: i32) -> Result<(), CafError> {
    if rc == ffi::MPI_SUCCESS as i32 {
        Ok(())
    } else {
        Err(CafError::Mpi(rc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cafrt_descriptor::{Attribute, BaseType, TypeKind};

    #[test]
    fn user_op_adapter_applies_fn_elementwise() {
        unsafe extern "C" fn add_i32(dst: *mut c_void, src: *mut c_void, _elem_len: usize) {
            unsafe {
                let d = dst as *mut i32;
                let s = src as *mut i32;
                *d += *s;
            }
        }

        ACTIVE_USER_OP.with(|cell| cell.set(Some((add_i32, 4))));
        let mut inout: [i32; 2] = [10, 20];
        let input: [i32; 2] = [1, 2];
        let mut len: c_int = 2;
        unsafe {
            user_op_adapter(
                input.as_ptr() as *mut c_void,
                inout.as_mut_ptr() as *mut c_void,
                &mut len,
                std::ptr::null_mut(),
            );
        }
        ACTIVE_USER_OP.with(|cell| cell.set(None));
        assert_eq!(inout, [11, 22]);
    }

    #[test]
    fn scalar_descriptor_element_count_is_one() {
        let d = Descriptor::scalar(
            std::ptr::null_mut(),
            4,
            TypeKind::new(BaseType::Integer, 4),
            Attribute::Other,
        );
        assert_eq!(d.element_count(), 1);
    }
}
