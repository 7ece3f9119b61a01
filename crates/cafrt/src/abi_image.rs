//! `stopped_images`, `failed_images`, `image_status`, `fail_image`,
//! `stop_numeric`, `stop_str`, `error_stop`, `error_stop_str` (`spec.md`
//! §6, §7 tier 2 "image-level" errors).
//!
//! `stop`/`error_stop` and `fail_image` are the three ways an image leaves
//! the job before `finalize`; each publishes its observed state on the
//! image-status window before exiting, matching `spec.md` §4.B "Failure
//! policy" and §9 "Exceptions / aborts".

use std::os::raw::{c_char, c_int};

use cafrt_core::{status, ImageId, ImageStatus};

use crate::runtime::{self, with_runtime};

/// `spec.md` §6 `image_status`: `0` (no `STAT_*` code applies) when `image`
/// is observed alive, otherwise `STAT_STOPPED_IMAGE`/`STAT_FAILED_IMAGE`.
#[no_mangle]
pub unsafe extern "C" fn caf_image_status(image: c_int) -> c_int {
    with_runtime(|rt| {
        Ok(match rt.image_status(ImageId(image)) {
            ImageStatus::Alive => 0,
            ImageStatus::Stopped => status::STAT_STOPPED_IMAGE,
            ImageStatus::Failed => status::STAT_FAILED_IMAGE,
        })
    })
    .unwrap_or(0)
}

/// Writes up to `cap` 1-based image numbers observed `Stopped` into `out`,
/// returning the number actually written. `spec.md` §6 `stopped_images`.
///
/// # Safety
/// `out` must point to `cap` writable `i32`s, or be null when `cap == 0`.
#[no_mangle]
pub unsafe extern "C" fn caf_stopped_images(out: *mut i32, cap: usize) -> usize {
    write_image_list(out, cap, |rt| rt.window.image_status().stopped())
}

/// As [`caf_stopped_images`], for images observed `Failed`. `spec.md` §6
/// `failed_images`.
///
/// # Safety
/// `out` must point to `cap` writable `i32`s, or be null when `cap == 0`.
#[no_mangle]
pub unsafe extern "C" fn caf_failed_images(out: *mut i32, cap: usize) -> usize {
    write_image_list(out, cap, |rt| rt.window.image_status().failed())
}

unsafe fn write_image_list(
    out: *mut i32,
    cap: usize,
    select: impl FnOnce(&runtime::Runtime) -> Vec<i32>,
) -> usize {
    let images = with_runtime(|rt| Ok(select(rt))).unwrap_or_default();
    if !out.is_null() {
        let n = images.len().min(cap);
        std::ptr::copy_nonoverlapping(images.as_ptr(), out, n);
    }
    images.len()
}

/// `spec.md` §6 `fail_image`: the Fortran `FAIL IMAGE` statement. Publishes
/// `Failed` for the calling image, then terminates it; peers observe this
/// through a subsequent `sync_all`/`sync_images`/`image_status` call
/// (`spec.md` §4.B "Failure policy").
#[no_mangle]
pub unsafe extern "C" fn caf_fail_image() -> ! {
    let _ = with_runtime(|rt| rt.publish_status(ImageStatus::Failed));
    std::process::exit(1)
}

/// `spec.md` §6 `stop_numeric`: the Fortran `STOP code` statement.
#[no_mangle]
pub unsafe extern "C" fn caf_stop_numeric(code: c_int) -> ! {
    let _ = with_runtime(|rt| rt.publish_status(ImageStatus::Stopped));
    std::process::exit(code)
}

/// `spec.md` §6 `stop_str`: `STOP "message"`. The message is logged, not
/// returned through the process exit code (Fortran `STOP` with a character
/// constant exits with status zero).
///
/// # Safety
/// `msg` must point to `msg_len` readable bytes, or be null when
/// `msg_len == 0`.
#[no_mangle]
pub unsafe extern "C" fn caf_stop_str(msg: *const c_char, msg_len: c_int) -> ! {
    log_message("STOP", msg, msg_len);
    let _ = with_runtime(|rt| rt.publish_status(ImageStatus::Stopped));
    std::process::exit(0)
}

/// `spec.md` §6 `error_stop`: `ERROR STOP code`, error termination.
#[no_mangle]
pub unsafe extern "C" fn caf_error_stop(code: c_int) -> ! {
    let _ = with_runtime(|rt| rt.publish_status(ImageStatus::Failed));
    std::process::exit(if code == 0 { 1 } else { code })
}

/// `spec.md` §6 `error_stop_str`: `ERROR STOP "message"`.
///
/// # Safety
/// Same as [`caf_stop_str`].
#[no_mangle]
pub unsafe extern "C" fn caf_error_stop_str(msg: *const c_char, msg_len: c_int) -> ! {
    log_message("ERROR STOP", msg, msg_len);
    let _ = with_runtime(|rt| rt.publish_status(ImageStatus::Failed));
    std::process::exit(1)
}

unsafe fn log_message(kind: &str, msg: *const c_char, msg_len: c_int) {
    if msg.is_null() || msg_len <= 0 {
        log::error!("cafrt: {kind}");
        return;
    }
    let bytes = std::slice::from_raw_parts(msg as *const u8, msg_len as usize);
    log::error!("cafrt: {kind}: {}", String::from_utf8_lossy(bytes));
}
