//! `co_broadcast`, `co_sum`/`co_min`/`co_max`/`co_reduce`, `lock`/`unlock`,
//! `event_post`/`event_wait`/`event_query`, `atomic_define`/`atomic_ref`/
//! `atomic_cas`/`atomic_op` (`spec.md` §4.G, §6).
//!
//! Every entry point here resolves its token to a window via the same
//! `window_for_token` helper `abi_transfer` uses, then delegates to the
//! matching `cafrt_collective` primitive.

use std::os::raw::{c_char, c_int};

use cafrt_core::{CafError, ImageId};
use cafrt_descriptor::{Descriptor, TypeKind};
use cafrt_window::TokenId;

use crate::abi_transfer::window_for_token;
use crate::runtime::with_runtime;
use crate::stat::report;

/// `spec.md` §6 `co_broadcast`.
///
/// # Safety
/// `buf` must point to `byte_len` writable bytes holding `elem_len`-sized
/// contiguous elements of `kind`.
#[no_mangle]
pub unsafe extern "C" fn caf_co_broadcast(
    token: u64,
    image: c_int,
    kind: TypeKind,
    elem_len: usize,
    buf: *mut u8,
    byte_len: usize,
    source: c_int,
    stat: *mut i32,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) {
    let _ = (token, image);
    let bytes = std::slice::from_raw_parts_mut(buf, byte_len);
    let mut desc = Descriptor::scalar(buf, elem_len, kind, cafrt_descriptor::Attribute::Other);
    let result = with_runtime(|rt| cafrt_collective::co_broadcast(&rt.world, &mut desc, bytes, ImageId(source)));
    report(result, stat, errmsg, errmsg_len);
}

macro_rules! builtin_reduce_entry {
    ($name:ident, $func:path) => {
        /// # Safety
        /// `buf` must point to `byte_len` writable bytes holding
        /// `elem_len`-sized contiguous elements of `kind`.
        #[no_mangle]
        pub unsafe extern "C" fn $name(
            kind: TypeKind,
            elem_len: usize,
            buf: *mut u8,
            byte_len: usize,
            result_image: c_int,
            stat: *mut i32,
            errmsg: *mut c_char,
            errmsg_len: c_int,
        ) {
            let bytes = std::slice::from_raw_parts_mut(buf, byte_len);
            let desc = Descriptor::scalar(buf, elem_len, kind, cafrt_descriptor::Attribute::Other);
            let result = with_runtime(|rt| $func(&rt.world, &desc, bytes, ImageId(result_image)));
            report(result, stat, errmsg, errmsg_len);
        }
    };
}

builtin_reduce_entry!(caf_co_sum, cafrt_collective::co_sum);
builtin_reduce_entry!(caf_co_min, cafrt_collective::co_min);
builtin_reduce_entry!(caf_co_max, cafrt_collective::co_max);

/// `spec.md` §6 `co_reduce`.
///
/// # Safety
/// `buf` must point to `byte_len` writable bytes; `user_fn` must be a
/// valid function pointer matching [`cafrt_collective::UserReduceFn`].
#[no_mangle]
pub unsafe extern "C" fn caf_co_reduce(
    kind: TypeKind,
    elem_len: usize,
    buf: *mut u8,
    byte_len: usize,
    result_image: c_int,
    user_fn: cafrt_collective::UserReduceFn,
    stat: *mut i32,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) {
    let bytes = std::slice::from_raw_parts_mut(buf, byte_len);
    let desc = Descriptor::scalar(buf, elem_len, kind, cafrt_descriptor::Attribute::Other);
    let result =
        with_runtime(|rt| cafrt_collective::co_reduce(&rt.world, &desc, bytes, ImageId(result_image), user_fn));
    report(result, stat, errmsg, errmsg_len);
}

/// `spec.md` §6 `lock`: `token` must have been registered with a lock
/// kind. Blocks until acquired or the holder is observed failed.
#[no_mangle]
pub unsafe extern "C" fn caf_lock(
    token: u64,
    image: c_int,
    stat: *mut i32,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) {
    let result = with_runtime(|rt| {
        let win = window_for_token(rt, TokenId(token))?;
        let self_image = rt.self_image();
        cafrt_collective::lock(win, ImageId(image).as_rank(), 0, self_image, rt.config.spin_backoff, || {
            matches!(rt.image_status(ImageId(image)), cafrt_core::ImageStatus::Failed)
        })
    });
    report(result, stat, errmsg, errmsg_len);
}

/// `spec.md` §6 `unlock`.
#[no_mangle]
pub unsafe extern "C" fn caf_unlock(
    token: u64,
    image: c_int,
    stat: *mut i32,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) {
    let result = with_runtime(|rt| {
        let win = window_for_token(rt, TokenId(token))?;
        let self_image = rt.self_image();
        cafrt_collective::unlock(win, ImageId(image).as_rank(), 0, self_image)
    });
    report(result, stat, errmsg, errmsg_len);
}

/// `spec.md` §6 `event_post`.
#[no_mangle]
pub unsafe extern "C" fn caf_event_post(
    token: u64,
    image: c_int,
    stat: *mut i32,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) {
    let result = with_runtime(|rt| {
        let win = window_for_token(rt, TokenId(token))?;
        cafrt_collective::event_post(win, ImageId(image).as_rank(), 0)
    });
    report(result, stat, errmsg, errmsg_len);
}

/// `spec.md` §6 `event_wait`.
#[no_mangle]
pub unsafe extern "C" fn caf_event_wait(
    token: u64,
    image: c_int,
    until_count: c_int,
    stat: *mut i32,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) {
    let result = with_runtime(|rt| {
        let win = window_for_token(rt, TokenId(token))?;
        cafrt_collective::event_wait(win, ImageId(image).as_rank(), 0, until_count, rt.config.spin_backoff)
    });
    report(result, stat, errmsg, errmsg_len);
}

/// `spec.md` §6 `event_query`.
#[no_mangle]
pub unsafe extern "C" fn caf_event_query(
    token: u64,
    image: c_int,
    stat: *mut i32,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) -> c_int {
    let result = with_runtime(|rt| {
        let win = window_for_token(rt, TokenId(token))?;
        cafrt_collective::event_query(win, ImageId(image).as_rank(), 0)
    });
    report(result, stat, errmsg, errmsg_len).unwrap_or(0)
}

/// `spec.md` §6 `atomic_define`.
#[no_mangle]
pub unsafe extern "C" fn caf_atomic_define(
    token: u64,
    image: c_int,
    offset: isize,
    value: i32,
    stat: *mut i32,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) {
    let result = with_runtime(|rt| {
        let win = window_for_token(rt, TokenId(token))?;
        cafrt_collective::atomic_define(win, ImageId(image).as_rank(), offset, value)
    });
    report(result, stat, errmsg, errmsg_len);
}

/// `spec.md` §6 `atomic_ref`.
#[no_mangle]
pub unsafe extern "C" fn caf_atomic_ref(
    token: u64,
    image: c_int,
    offset: isize,
    stat: *mut i32,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) -> i32 {
    let result = with_runtime(|rt| {
        let win = window_for_token(rt, TokenId(token))?;
        cafrt_collective::atomic_ref(win, ImageId(image).as_rank(), offset)
    });
    report(result, stat, errmsg, errmsg_len).unwrap_or(0)
}

/// `spec.md` §6 `atomic_cas`.
#[no_mangle]
pub unsafe extern "C" fn caf_atomic_cas(
    token: u64,
    image: c_int,
    offset: isize,
    compare: i32,
    new_value: i32,
    stat: *mut i32,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) -> i32 {
    let result = with_runtime(|rt| {
        let win = window_for_token(rt, TokenId(token))?;
        cafrt_collective::atomic_cas(win, ImageId(image).as_rank(), offset, compare, new_value)
    });
    report(result, stat, errmsg, errmsg_len).unwrap_or(0)
}

/// `spec.md` §6 `atomic_op`. `op` is the wire encoding `0..=3` for
/// `add|band|bor|bxor`.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn caf_atomic_op(
    token: u64,
    image: c_int,
    offset: isize,
    op: c_int,
    operand: i32,
    stat: *mut i32,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) -> i32 {
    let op = match op {
        0 => cafrt_collective::AtomicOp::Add,
        1 => cafrt_collective::AtomicOp::Band,
        2 => cafrt_collective::AtomicOp::Bor,
        _ => cafrt_collective::AtomicOp::Bxor,
    };
    let result = with_runtime(|rt| {
        let win = window_for_token(rt, TokenId(token))?;
        cafrt_collective::atomic_op(win, ImageId(image).as_rank(), offset, op, operand)
    });
    report(result, stat, errmsg, errmsg_len).unwrap_or(0)
}
