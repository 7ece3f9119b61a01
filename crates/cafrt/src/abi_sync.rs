//! `sync_all`, `sync_images` (`spec.md` §4.G, §6).

use std::os::raw::{c_char, c_int};

use cafrt_core::ImageId;

use crate::runtime::with_runtime_mut;
use crate::stat::report;

/// `spec.md` §6 `sync_all`: flushes pending puts, then barriers.
#[no_mangle]
pub unsafe extern "C" fn caf_sync_all(stat: *mut c_int, errmsg: *mut c_char, errmsg_len: c_int) {
    let result = with_runtime_mut(|rt| {
        rt.window.sync_memory()?;
        cafrt_collective::sync_all(&rt.world)
    });
    report(result, stat, errmsg, errmsg_len);
}

/// `spec.md` §6 `sync_images`: `images` is a caller-owned array of 1-based
/// image numbers, `count` long.
///
/// # Safety
/// `images` must point to `count` readable `i32`s.
#[no_mangle]
pub unsafe extern "C" fn caf_sync_images(
    images: *const i32,
    count: c_int,
    stat: *mut c_int,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) {
    let peers: Vec<ImageId> = if images.is_null() || count <= 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(images, count as usize)
            .iter()
            .map(|&i| ImageId(i))
            .collect()
    };
    let result = with_runtime_mut(|rt| {
        rt.window.sync_memory()?;
        let self_image = rt.self_image();
        let comm = rt.world.clone();
        cafrt_collective::sync_images(&comm, self_image, &peers)
    });
    report(result, stat, errmsg, errmsg_len);
}
