//! `form_team`, `change_team`, `end_team`, `sync_team`, `team_number`,
//! `get_team`, `get_communicator` (`spec.md` §4.C, §6).
//!
//! Team handles cross the ABI boundary as the opaque `i64` returned by
//! [`cafrt_team::TeamHandle::as_raw`]; callers store it verbatim and hand
//! it back to `change_team`/`sync_team`/`get_communicator`.

use std::os::raw::{c_char, c_int};

use cafrt_core::TeamId;
use cafrt_team::TeamHandle;
use mpi::raw::AsRaw;

use crate::runtime::{with_runtime, with_runtime_mut};
use crate::stat::report;
use crate::wire::team_level_from_wire;

/// `spec.md` §6 `form_team`: splits the current communicator by `team_id`.
/// `new_index` of `i32::MIN` is treated as "absent", matching the
/// optional-argument default in `spec.md` §4.C.
#[no_mangle]
pub unsafe extern "C" fn caf_form_team(
    team_id: i64,
    new_index: c_int,
    stat: *mut c_int,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) -> i64 {
    let new_index = if new_index == i32::MIN { None } else { Some(new_index) };
    let result = with_runtime_mut(|rt| rt.teams.form_team(TeamId(team_id), new_index));
    report(result, stat, errmsg, errmsg_len)
        .map(|h| h.as_raw())
        .unwrap_or(-1)
}

/// `spec.md` §6 `change_team`.
#[no_mangle]
pub unsafe extern "C" fn caf_change_team(
    handle: i64,
    stat: *mut c_int,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) {
    let result = with_runtime_mut(|rt| rt.teams.change_team(TeamHandle::from_raw(handle)));
    report(result, stat, errmsg, errmsg_len);
}

/// `spec.md` §6 `end_team`: pops the current team and deregisters every
/// token that was registered while it was current (`spec.md` §3 "Team
/// stack" ownership rule).
#[no_mangle]
pub unsafe extern "C" fn caf_end_team(stat: *mut c_int, errmsg: *mut c_char, errmsg_len: c_int) {
    let result = with_runtime_mut(|rt| {
        let tokens = rt.teams.end_team()?;
        for token in tokens {
            rt.window.deregister(token, cafrt_window::DeregisterMode::Full)?;
        }
        Ok(())
    });
    report(result, stat, errmsg, errmsg_len);
}

/// `spec.md` §6 `sync_team`.
#[no_mangle]
pub unsafe extern "C" fn caf_sync_team(handle: i64, stat: *mut c_int, errmsg: *mut c_char, errmsg_len: c_int) {
    let result = with_runtime(|rt| rt.teams.sync_team(TeamHandle::from_raw(handle)));
    report(result, stat, errmsg, errmsg_len);
}

/// `this_image(team)`.
#[no_mangle]
pub unsafe extern "C" fn caf_this_image_team(handle: i64) -> c_int {
    with_runtime(|rt| Ok(rt.teams.this_image(TeamHandle::from_raw(handle)).0))
        .unwrap_or_else(|e| crate::runtime::terminate_internal(&e.to_string()))
}

/// `num_images(team, team_number)`.
#[no_mangle]
pub unsafe extern "C" fn caf_num_images_team(handle: i64) -> c_int {
    with_runtime(|rt| Ok(rt.teams.num_images(TeamHandle::from_raw(handle))))
        .unwrap_or_else(|e| crate::runtime::terminate_internal(&e.to_string()))
}

/// `spec.md` §6 `team_number`.
#[no_mangle]
pub unsafe extern "C" fn caf_team_number(handle: i64) -> i64 {
    with_runtime(|rt| Ok(rt.teams.team_number(TeamHandle::from_raw(handle))))
        .unwrap_or_else(|e| crate::runtime::terminate_internal(&e.to_string()))
}

/// `spec.md` §6 `get_team`: `level` is the wire encoding from
/// [`crate::wire::team_level_from_wire`].
#[no_mangle]
pub unsafe extern "C" fn caf_get_team(level: c_int) -> i64 {
    with_runtime(|rt| Ok(rt.teams.get_team(team_level_from_wire(level)).as_raw()))
        .unwrap_or_else(|e| crate::runtime::terminate_internal(&e.to_string()))
}

/// `spec.md` §6 `get_communicator`: the underlying communicator's raw
/// handle, opaque to the caller beyond passing it back into code that
/// expects an `MPI_Comm`.
#[no_mangle]
pub unsafe extern "C" fn caf_get_communicator(
    handle: i64,
    stat: *mut c_int,
    errmsg: *mut c_char,
    errmsg_len: c_int,
) -> u64 {
    let result = with_runtime(|rt| {
        let comm = rt.teams.get_communicator(TeamHandle::from_raw(handle))?;
        Ok(comm.as_raw() as usize as u64)
    });
    report(result, stat, errmsg, errmsg_len).unwrap_or(0)
}
