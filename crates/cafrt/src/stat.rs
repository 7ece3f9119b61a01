//! Collapses a [`CafError`] down to the `stat`/`errmsg` out-parameters the
//! ABI surface uses, and the tier-3 fatal path (`spec.md` §7).
//!
//! Every `abi_*` entry point that accepts an optional `stat` pointer should
//! route its `Result` through [`report`] exactly once, at the boundary —
//! nowhere else in the crate writes to a raw `stat`/`errmsg` pointer.

use std::os::raw::c_char;

use cafrt_core::CafError;

use crate::runtime::terminate_internal;

/// Writes `text` into `errmsg[..errmsg_len]`, space-padding (not
/// NUL-terminating, matching Fortran's fixed-length character semantics)
/// when `text` is shorter.
///
/// # Safety
/// `errmsg` must point to at least `errmsg_len` writable bytes, or be null
/// (in which case this is a no-op).
unsafe fn write_errmsg(errmsg: *mut c_char, errmsg_len: i32, text: &str) {
    if errmsg.is_null() || errmsg_len <= 0 {
        return;
    }
    let len = errmsg_len as usize;
    let bytes = text.as_bytes();
    let n = bytes.len().min(len);
    std::ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, errmsg, n);
    for i in n..len {
        *errmsg.add(i) = b' ' as c_char;
    }
}

/// Reports `result` through the three-tier error model: success writes
/// `stat = 0` (when `stat` is non-null); a recoverable/image-level error
/// writes its code to `stat` and a message to `errmsg`; a fatal error
/// aborts the process when `stat` is null, or reports
/// [`cafrt_core::status::FAILURE`]-class codes through it otherwise
/// (`spec.md` §7).
///
/// # Safety
/// `stat`, if non-null, must point to one writable `i32`; `errmsg`, if
/// non-null, must point to at least `errmsg_len` writable bytes.
pub unsafe fn report<T>(
    result: Result<T, CafError>,
    stat: *mut i32,
    errmsg: *mut c_char,
    errmsg_len: i32,
) -> Option<T> {
    match result {
        Ok(v) => {
            // `spec.md` §7: "set it to zero on success", independent of the
            // unrelated `SUCCESS = 1` sentinel in the §6 status table (that
            // one names a wire value for the lock/sync protocols, not the
            // `stat` convention).
            if !stat.is_null() {
                *stat = 0;
            }
            Some(v)
        }
        Err(e) => {
            if e.is_fatal() && stat.is_null() {
                terminate_internal(&e.to_string());
            }
            if !stat.is_null() {
                *stat = e.to_stat();
            }
            write_errmsg(errmsg, errmsg_len, &e.to_string());
            None
        }
    }
}
