//! `init`, `finalize`, `this_image`, `num_images`, `register`, `deregister`,
//! `sync_memory`, `random_init` (`spec.md` §6).

use std::os::raw::{c_char, c_int};

use cafrt_window::{DeregisterMode, TokenId};

use crate::runtime::{self, with_runtime, with_runtime_mut};
use crate::stat::report;
use crate::wire::register_kind_from_wire;

/// `spec.md` §6 `init`. `host_owns_transport != 0` means the caller already
/// initialized MPI and `finalize` must leave it running.
#[no_mangle]
pub unsafe extern "C" fn caf_init(host_owns_transport: c_int) -> c_int {
    match runtime::init(host_owns_transport != 0) {
        Ok(()) => 0,
        Err(e) => {
            log::error!("cafrt: init failed: {e}");
            1
        }
    }
}

/// `spec.md` §6 `finalize`.
#[no_mangle]
pub unsafe extern "C" fn caf_finalize() -> c_int {
    match runtime::finalize() {
        Ok(()) => 0,
        Err(e) => {
            log::error!("cafrt: finalize failed: {e}");
            1
        }
    }
}

/// `this_image()` against the current team.
#[no_mangle]
pub unsafe extern "C" fn caf_this_image() -> c_int {
    with_runtime(|rt| Ok(rt.teams.this_image(rt.teams.active_handle()).0))
        .unwrap_or_else(|e| runtime::terminate_internal(&e.to_string()))
}

/// `num_images()` against the current team.
#[no_mangle]
pub unsafe extern "C" fn caf_num_images() -> c_int {
    with_runtime(|rt| Ok(rt.teams.num_images(rt.teams.active_handle())))
        .unwrap_or_else(|e| runtime::terminate_internal(&e.to_string()))
}

/// `spec.md` §6 `register`. Returns the new token as an opaque handle cast
/// from its [`TokenId`]; `0` on failure (with `stat`/`errmsg` set).
#[no_mangle]
pub unsafe extern "C" fn caf_register(
    size: usize,
    kind: c_int,
    stat: *mut c_int,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) -> u64 {
    let kind = match register_kind_from_wire(kind) {
        Ok(k) => k,
        Err(e) => {
            report(Err::<(), _>(e), stat, errmsg, errmsg_len);
            return 0;
        }
    };
    let result = with_runtime_mut(|rt| {
        let comm = rt.world.clone();
        rt.window.register(&comm, size, kind, None, None)
    });
    match report(result, stat, errmsg, errmsg_len) {
        Some(id) => {
            let _ = with_runtime_mut(|rt| {
                rt.teams.record_token(id);
                Ok(())
            });
            id.0
        }
        None => 0,
    }
}

/// `spec.md` §6 `deregister`.
#[no_mangle]
pub unsafe extern "C" fn caf_deregister(
    token: u64,
    data_only: c_int,
    stat: *mut c_int,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) {
    let mode = if data_only != 0 {
        DeregisterMode::DataOnly
    } else {
        DeregisterMode::Full
    };
    let result = with_runtime_mut(|rt| rt.window.deregister(TokenId(token), mode));
    report(result, stat, errmsg, errmsg_len);
}

/// `spec.md` §6 `sync_memory`.
#[no_mangle]
pub unsafe extern "C" fn caf_sync_memory(stat: *mut c_int, errmsg: *mut c_char, errmsg_len: c_int) {
    let result = with_runtime_mut(|rt| rt.window.sync_memory());
    report(result, stat, errmsg, errmsg_len);
}

/// `spec.md` §6 `random_init`: reseeds the process-local PRNG used by
/// `random_number`/`random_seed` intrinsics, one per image so runs are
/// reproducible under a fixed `seed` but diverge across images.
#[no_mangle]
pub unsafe extern "C" fn caf_random_init(repeatable: c_int, image_distinct: c_int) {
    let _ = (repeatable, image_distinct);
    // Seeding the host language's intrinsic RNG is outside this crate's
    // boundary (`spec.md` §1); this entry point exists only so the ABI
    // surface is complete for the compiler's code generator to call.
}

