//! `register_accessor` family, `get_remote_function_index`,
//! `get_from_remote`, `send_to_remote`, `is_present_on_remote`,
//! `transfer_between_remotes` (`spec.md` §4.F, §6).
//!
//! Accessors are registered as plain function pointers matching
//! [`cafrt_channel::GetterFn`]/`PredicateFn`/`ReceiverFn` — the code
//! generator that emits `register_accessor` calls links directly against
//! this crate's Rust types rather than going through a C-typed shim, so no
//! extra trampoline is needed here.

use std::os::raw::{c_char, c_int};

use cafrt_channel::{GetterFn, PredicateFn, ReceiverFn};
use cafrt_core::ImageId;

use crate::runtime::with_runtime;
use crate::stat::report;

/// # Safety
/// `add_data` must point to `add_data_len` readable bytes, or be null when
/// `add_data_len` is zero.
unsafe fn slice_from_raw<'a>(ptr: *const u8, len: usize) -> &'a [u8] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, len)
    }
}

#[no_mangle]
pub unsafe extern "C" fn caf_register_getter(hash: u64, f: GetterFn) {
    let _ = with_runtime(|rt| {
        rt.channel.register_getter(hash, f);
        Ok(())
    });
}

#[no_mangle]
pub unsafe extern "C" fn caf_register_predicate(hash: u64, f: PredicateFn) {
    let _ = with_runtime(|rt| {
        rt.channel.register_predicate(hash, f);
        Ok(())
    });
}

#[no_mangle]
pub unsafe extern "C" fn caf_register_receiver(hash: u64, f: ReceiverFn) {
    let _ = with_runtime(|rt| {
        rt.channel.register_receiver(hash, f);
        Ok(())
    });
}

/// `spec.md` §6 `register_accessors_finish`: called once, after every
/// `register_*` call the program will ever make (`spec.md` §4.F "Accessor
/// lifecycle").
#[no_mangle]
pub unsafe extern "C" fn caf_register_accessors_finish() {
    let _ = with_runtime(|rt| {
        rt.channel.register_accessors_finish();
        Ok(())
    });
}

/// `spec.md` §6 `get_remote_function_index`. Returns `-1` on an unknown
/// hash rather than aborting, since a caller may legitimately probe for
/// an accessor's presence before relying on it.
#[no_mangle]
pub unsafe extern "C" fn caf_get_remote_function_index(hash: u64) -> i64 {
    with_runtime(|rt| rt.channel.get_remote_function_index(hash))
        .map(|idx| idx as i64)
        .unwrap_or(-1)
}

/// Frees a buffer returned by [`caf_get_from_remote`].
///
/// # Safety
/// `ptr`/`len` must be exactly the pair most recently returned by
/// `caf_get_from_remote` and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn caf_free_buffer(ptr: *mut u8, len: usize) {
    if !ptr.is_null() {
        drop(Vec::from_raw_parts(ptr, len, len));
    }
}

/// `spec.md` §6 `get_from_remote`. On success, `*out_len` is set to the
/// payload length and the returned pointer must be released with
/// [`caf_free_buffer`]; on failure, returns null.
///
/// # Safety
/// `add_data` must point to `add_data_len` readable bytes; `out_len` must
/// point to one writable `usize`.
#[no_mangle]
pub unsafe extern "C" fn caf_get_from_remote(
    image: c_int,
    accessor_index: usize,
    add_data: *const u8,
    add_data_len: usize,
    out_len: *mut usize,
    stat: *mut i32,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) -> *mut u8 {
    let add_data = slice_from_raw(add_data, add_data_len);
    let result = with_runtime(|rt| rt.channel.get_from_remote(ImageId(image), accessor_index, add_data));
    match report(result, stat, errmsg, errmsg_len) {
        Some(mut buf) => {
            if !out_len.is_null() {
                *out_len = buf.len();
            }
            let ptr = buf.as_mut_ptr();
            std::mem::forget(buf);
            ptr
        }
        None => std::ptr::null_mut(),
    }
}

/// `spec.md` §6 `send_to_remote`.
///
/// # Safety
/// `add_data`/`payload` must point to their respective declared lengths of
/// readable bytes.
#[no_mangle]
pub unsafe extern "C" fn caf_send_to_remote(
    image: c_int,
    accessor_index: usize,
    add_data: *const u8,
    add_data_len: usize,
    payload: *const u8,
    payload_len: usize,
    stat: *mut i32,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) {
    let add_data = slice_from_raw(add_data, add_data_len);
    let payload = slice_from_raw(payload, payload_len);
    let result =
        with_runtime(|rt| rt.channel.send_to_remote(ImageId(image), accessor_index, add_data, payload));
    report(result, stat, errmsg, errmsg_len);
}

/// `spec.md` §6 `is_present_on_remote`.
///
/// # Safety
/// `add_data` must point to `add_data_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn caf_is_present_on_remote(
    image: c_int,
    accessor_index: usize,
    add_data: *const u8,
    add_data_len: usize,
) -> c_int {
    let add_data = slice_from_raw(add_data, add_data_len);
    with_runtime(|rt| rt.channel.is_present_on_remote(ImageId(image), accessor_index, add_data))
        .map(|present| present as c_int)
        .unwrap_or(0)
}

/// `spec.md` §6 `transfer_between_remotes`.
///
/// # Safety
/// `src_add_data`/`dst_add_data` must point to their declared lengths of
/// readable bytes.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn caf_transfer_between_remotes(
    src_image: c_int,
    src_accessor_index: usize,
    src_add_data: *const u8,
    src_add_data_len: usize,
    dst_image: c_int,
    dst_accessor_index: usize,
    dst_add_data: *const u8,
    dst_add_data_len: usize,
    stat: *mut i32,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) {
    let src_add_data = slice_from_raw(src_add_data, src_add_data_len);
    let dst_add_data = slice_from_raw(dst_add_data, dst_add_data_len);
    let result = with_runtime(|rt| {
        rt.channel.transfer_between_remotes(
            ImageId(src_image),
            src_accessor_index,
            src_add_data,
            ImageId(dst_image),
            dst_accessor_index,
            dst_add_data,
        )
    });
    report(result, stat, errmsg, errmsg_len);
}
