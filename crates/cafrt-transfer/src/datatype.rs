//! Strided and indexed MPI datatypes built from a descriptor's
//! `(extent, stride)` pairs (`spec.md` §4.D decision-ladder step 3).
//!
//! Grounded in `original_source/src/mpi/helper.c`'s use of
//! `MPI_Type_vector`/`MPI_Type_hindexed`; freed through a [`Drop`] guard so a
//! panic mid-transfer cannot leak the committed handle.

use std::os::raw::c_int;

use cafrt_core::CafError;
use mpi::ffi;

/// An `MPI_Datatype` built and committed for exactly one transfer, freed
/// automatically when dropped.
pub struct TransferDatatype {
    handle: ffi::MPI_Datatype,
}

impl TransferDatatype {
    /// `MPI_Type_contiguous`: a block of `count` copies of `elem_type`,
    /// used to build an element-sized oldtype before vectoring over it.
    pub fn contiguous(count: i64, elem_type: ffi::MPI_Datatype) -> Result<Self, CafError> {
        let mut handle = std::ptr::null_mut();
        let rc = unsafe { ffi::MPI_Type_contiguous(count as c_int, elem_type, &mut handle) };
        check(rc)?;
        commit(&mut handle)?;
        Ok(TransferDatatype { handle })
    }

    /// `MPI_Type_vector(count, blocklen, stride, elem_type, &dt)` then
    /// `MPI_Type_commit`, for a single strided dimension (`spec.md` §4.D
    /// "build MPI strided ... datatypes from the descriptor's
    /// `(extent, stride)`").
    pub fn vector(
        count: i64,
        blocklen: i64,
        stride_elems: i64,
        elem_type: ffi::MPI_Datatype,
    ) -> Result<Self, CafError> {
        let mut handle = std::ptr::null_mut();
        let rc = unsafe {
            ffi::MPI_Type_vector(
                count as c_int,
                blocklen as c_int,
                stride_elems as c_int,
                elem_type,
                &mut handle,
            )
        };
        check(rc)?;
        commit(&mut handle)?;
        Ok(TransferDatatype { handle })
    }

    /// `MPI_Type_indexed`, for the vector-subscript case in the
    /// reference-chain interpreter (`spec.md` §4.D / §4.E).
    pub fn indexed(
        blocklens: &[i32],
        displacements_elems: &[i32],
        elem_type: ffi::MPI_Datatype,
    ) -> Result<Self, CafError> {
        let mut handle = std::ptr::null_mut();
        let rc = unsafe {
            ffi::MPI_Type_indexed(
                blocklens.len() as c_int,
                blocklens.as_ptr() as *mut c_int,
                displacements_elems.as_ptr() as *mut c_int,
                elem_type,
                &mut handle,
            )
        };
        check(rc)?;
        commit(&mut handle)?;
        Ok(TransferDatatype { handle })
    }

    pub fn raw(&self) -> ffi::MPI_Datatype {
        self.handle
    }
}

fn commit(handle: &mut ffi::MPI_Datatype) -> Result<(), CafError> {
    check(unsafe { ffi::MPI_Type_commit(handle) })
}

impl Drop for TransferDatatype {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe {
                ffi::MPI_Type_free(&mut self.handle);
            }
        }
    }
}

fn check(rc: i32) -> Result<(), CafError> {
    if rc == ffi::MPI_SUCCESS as i32 {
        Ok(())
    } else {
        Err(CafError::Mpi(rc))
    }
}
