//! Thin wrapper around the MPI-3 one-sided calls the window manager needs.
//!
//! `mpi` (rsmpi)'s safe `Window` wrapper does not cover dynamic windows,
//! `MPI_Win_attach`/`detach`, or the exclusive-lock/fetch-and-op primitives
//! atomics and locks need, so — as OpenCoarrays' own `mpi_caf.c` does at the
//! C level — we go through the raw `mpi::ffi` bindings here and keep every
//! other crate away from `unsafe` MPI calls entirely.

use std::os::raw::c_void;

use cafrt_core::CafError;
use mpi::ffi;
use mpi::raw::AsRaw;
use mpi::topology::SimpleCommunicator;

/// One registered RMA window: either a window created over a fixed region
/// (`spec.md` §4.B primary token) or the single process-wide dynamic window
/// slave tokens attach to.
pub struct RmaWindow {
    handle: ffi::MPI_Win,
}

// SAFETY: an MPI_Win is a handle to process-wide state; MPI guarantees it
// may be used from any thread as long as calls into the same window are
// not issued concurrently without synchronization, which the callers in
// this crate uphold via `&mut` access to the owning `Token`.
unsafe impl Send for RmaWindow {}
unsafe impl Sync for RmaWindow {}

impl RmaWindow {
    /// `MPI_Win_create`: exposes `base[0..size)` on `comm` as a window.
    pub fn create(comm: &SimpleCommunicator, base: *mut u8, size: usize) -> Result<Self, CafError> {
        let mut handle = std::ptr::null_mut();
        let rc = unsafe {
            ffi::MPI_Win_create(
                base as *mut c_void,
                size as ffi::MPI_Aint,
                1,
                ffi::RSMPI_INFO_NULL,
                comm.as_raw(),
                &mut handle,
            )
        };
        check(rc)?;
        Ok(RmaWindow { handle })
    }

    /// `MPI_Win_create_dynamic`: the single process-wide "global dynamic
    /// window" that slave tokens attach their payload to (`spec.md` §3/§4.B).
    pub fn create_dynamic(comm: &SimpleCommunicator) -> Result<Self, CafError> {
        let mut handle = std::ptr::null_mut();
        let rc = unsafe {
            ffi::MPI_Win_create_dynamic(ffi::RSMPI_INFO_NULL, comm.as_raw(), &mut handle)
        };
        check(rc)?;
        Ok(RmaWindow { handle })
    }

    /// `MPI_Win_attach`: exposes `base[0..size)` through the dynamic window.
    pub fn attach(&self, base: *mut u8, size: usize) -> Result<(), CafError> {
        let rc = unsafe { ffi::MPI_Win_attach(self.handle, base as *mut c_void, size as ffi::MPI_Aint) };
        check(rc)
    }

    pub fn detach(&self, base: *mut u8) -> Result<(), CafError> {
        let rc = unsafe { ffi::MPI_Win_detach(self.handle, base as *mut c_void) };
        check(rc)
    }

    /// `MPI_Win_lock` + `MPI_Put` + `MPI_Win_unlock`, the simplest correct
    /// (if not the fastest) way to issue one contiguous put; callers that
    /// want non-blocking semantics use [`RmaWindow::put_nonblocking`]
    /// followed by a later flush instead.
    pub fn put(&self, target_rank: i32, target_offset: isize, data: &[u8]) -> Result<(), CafError> {
        self.with_exclusive_lock(target_rank, || unsafe {
            ffi::MPI_Put(
                data.as_ptr() as *const c_void,
                data.len() as i32,
                ffi::RSMPI_BYTE,
                target_rank,
                target_offset as ffi::MPI_Aint,
                data.len() as i32,
                ffi::RSMPI_BYTE,
                self.handle,
            )
        })
    }

    /// Issues the put without taking/releasing the lock itself; caller must
    /// already hold a lock epoch (used by the pending-put queue so several
    /// puts to the same image share one lock/unlock pair, per `spec.md`
    /// §4.D "Ordering guarantees").
    pub fn put_nonblocking(&self, target_rank: i32, target_offset: isize, data: &[u8]) -> Result<(), CafError> {
        let rc = unsafe {
            ffi::MPI_Put(
                data.as_ptr() as *const c_void,
                data.len() as i32,
                ffi::RSMPI_BYTE,
                target_rank,
                target_offset as ffi::MPI_Aint,
                data.len() as i32,
                ffi::RSMPI_BYTE,
                self.handle,
            )
        };
        check(rc)
    }

    /// `MPI_Put` with caller-supplied origin/target datatypes, used by the
    /// transfer engine's strided path so a single call can write through a
    /// derived `MPI_Type_vector`/`MPI_Type_indexed` target datatype
    /// (`spec.md` §4.D decision-ladder step 3).
    pub fn put_typed(
        &self,
        target_rank: i32,
        target_offset: isize,
        origin_ptr: *const u8,
        origin_count: i32,
        origin_type: ffi::MPI_Datatype,
        target_count: i32,
        target_type: ffi::MPI_Datatype,
    ) -> Result<(), CafError> {
        self.with_exclusive_lock(target_rank, || unsafe {
            ffi::MPI_Put(
                origin_ptr as *const c_void,
                origin_count,
                origin_type,
                target_rank,
                target_offset as ffi::MPI_Aint,
                target_count,
                target_type,
                self.handle,
            )
        })
    }

    /// `MPI_Get` with caller-supplied origin/target datatypes; see
    /// [`RmaWindow::put_typed`].
    pub fn get_typed(
        &self,
        target_rank: i32,
        target_offset: isize,
        origin_ptr: *mut u8,
        origin_count: i32,
        origin_type: ffi::MPI_Datatype,
        target_count: i32,
        target_type: ffi::MPI_Datatype,
    ) -> Result<(), CafError> {
        self.with_exclusive_lock(target_rank, || unsafe {
            ffi::MPI_Get(
                origin_ptr as *mut c_void,
                origin_count,
                origin_type,
                target_rank,
                target_offset as ffi::MPI_Aint,
                target_count,
                target_type,
                self.handle,
            )
        })
    }

    pub fn get(&self, target_rank: i32, target_offset: isize, buf: &mut [u8]) -> Result<(), CafError> {
        self.with_exclusive_lock(target_rank, || unsafe {
            ffi::MPI_Get(
                buf.as_mut_ptr() as *mut c_void,
                buf.len() as i32,
                ffi::RSMPI_BYTE,
                target_rank,
                target_offset as ffi::MPI_Aint,
                buf.len() as i32,
                ffi::RSMPI_BYTE,
                self.handle,
            )
        })
    }

    /// `MPI_Win_lock`/`MPI_Win_unlock` pair, used both for ordinary gets/puts
    /// and by the mutex/atomic primitives in `cafrt-collective`.
    pub fn with_exclusive_lock<F: FnOnce() -> i32>(&self, target_rank: i32, f: F) -> Result<(), CafError> {
        check(unsafe { ffi::MPI_Win_lock(ffi::RSMPI_LOCK_EXCLUSIVE as i32, target_rank, 0, self.handle) })?;
        let rc = f();
        check(unsafe { ffi::MPI_Win_unlock(target_rank, self.handle) })?;
        check(rc)
    }

    /// `MPI_Win_flush`: completes any outstanding RMA operations to
    /// `target_rank` without ending the access epoch (`spec.md` §4.D
    /// "Ordering guarantees" — used when a get must observe prior puts).
    pub fn flush(&self, target_rank: i32) -> Result<(), CafError> {
        check(unsafe { ffi::MPI_Win_flush(target_rank, self.handle) })
    }

    /// `MPI_Win_sync`: the local completion half of `sync_memory`
    /// (`spec.md` §4.B).
    pub fn sync_local(&self) -> Result<(), CafError> {
        check(unsafe { ffi::MPI_Win_sync(self.handle) })
    }

    pub fn fetch_and_op_i32(&self, target_rank: i32, target_offset: isize, operand: i32, op: ffi::MPI_Op) -> Result<i32, CafError> {
        let mut result: i32 = 0;
        check(unsafe { ffi::MPI_Win_lock(ffi::RSMPI_LOCK_EXCLUSIVE as i32, target_rank, 0, self.handle) })?;
        let rc = unsafe {
            ffi::MPI_Fetch_and_op(
                &operand as *const i32 as *const c_void,
                &mut result as *mut i32 as *mut c_void,
                ffi::RSMPI_INT32_T,
                target_rank,
                target_offset as ffi::MPI_Aint,
                op,
                self.handle,
            )
        };
        check(unsafe { ffi::MPI_Win_unlock(target_rank, self.handle) })?;
        check(rc)?;
        Ok(result)
    }

    pub fn compare_and_swap_i32(
        &self,
        target_rank: i32,
        target_offset: isize,
        compare: i32,
        new_value: i32,
    ) -> Result<i32, CafError> {
        let mut result: i32 = 0;
        check(unsafe { ffi::MPI_Win_lock(ffi::RSMPI_LOCK_EXCLUSIVE as i32, target_rank, 0, self.handle) })?;
        let rc = unsafe {
            ffi::MPI_Compare_and_swap(
                &new_value as *const i32 as *const c_void,
                &compare as *const i32 as *const c_void,
                &mut result as *mut i32 as *mut c_void,
                ffi::RSMPI_INT32_T,
                target_rank,
                target_offset as ffi::MPI_Aint,
                self.handle,
            )
        };
        check(unsafe { ffi::MPI_Win_unlock(target_rank, self.handle) })?;
        check(rc)?;
        Ok(result)
    }

    pub fn raw(&self) -> ffi::MPI_Win {
        self.handle
    }
}

impl Drop for RmaWindow {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe {
                ffi::MPI_Win_free(&mut self.handle);
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
