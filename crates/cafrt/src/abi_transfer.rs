//! `send`, `get`, `sendget`, `send_by_ref`, `get_by_ref`, `sendget_by_ref`,
//! `is_present` (`spec.md` §4.D, §4.E, §6).
//!
//! Descriptors and reference chains cross the ABI boundary already
//! translated into this crate's own [`cafrt_descriptor::Descriptor`] and
//! [`cafrt_refchain::RefNode`] shapes — the CFI/GFC descriptor-format
//! translation `spec.md` §6 calls out is a separate, out-of-scope shim that
//! runs before these entry points are reached.

use std::os::raw::c_int;

use cafrt_core::{CafError, ImageId};
use cafrt_descriptor::{Descriptor, TypeKind};
use cafrt_refchain::RefNode;
use cafrt_transfer::RemoteEndpoint;
use cafrt_window::{RmaWindow, TokenId};

use crate::runtime::{with_runtime, Runtime};
use crate::stat::report;

pub(crate) fn window_for_token<'a>(rt: &'a Runtime, token: TokenId) -> Result<&'a RmaWindow, CafError> {
    let tok = rt.window.registry().get(token)?;
    match tok.window() {
        Some(w) => Ok(w.as_ref()),
        None => Ok(rt.window.registry().global_dynamic_window()),
    }
}

fn endpoint<'a>(
    rt: &'a Runtime,
    token: TokenId,
    image: ImageId,
    offset: isize,
    type_kind: TypeKind,
) -> Result<RemoteEndpoint<'a>, CafError> {
    Ok(RemoteEndpoint {
        window: window_for_token(rt, token)?,
        image,
        offset,
        type_kind,
    })
}

/// `spec.md` §6 `send`: `src` is local memory, `dst_token`/`dst_image`/
/// `dst_offset` name the remote destination.
///
/// # Safety
/// `src` must point to a valid, fully-shaped [`Descriptor`].
#[no_mangle]
pub unsafe extern "C" fn caf_send(
    dst_token: u64,
    dst_image: c_int,
    dst_offset: isize,
    src: *const Descriptor,
    may_require_temp: c_int,
    stat: *mut i32,
    errmsg: *mut std::os::raw::c_char,
    errmsg_len: c_int,
) {
    let Some(src) = src.as_ref() else {
        report(Err::<(), _>(CafError::BaseAddrNull), stat, errmsg, errmsg_len);
        return;
    };
    let result = with_runtime(|rt| {
        let self_image = rt.self_image();
        let dst = endpoint(rt, TokenId(dst_token), ImageId(dst_image), dst_offset, src.type_kind)?;
        cafrt_transfer::send(self_image, &dst, src, may_require_temp != 0)
    });
    report(result, stat, errmsg, errmsg_len);
}

/// `spec.md` §6 `get`: mirror of `send`.
///
/// # Safety
/// `dst` must point to a valid, fully-shaped [`Descriptor`] with writable
/// storage already allocated for its current shape.
#[no_mangle]
pub unsafe extern "C" fn caf_get(
    dst: *mut Descriptor,
    src_token: u64,
    src_image: c_int,
    src_offset: isize,
    may_require_temp: c_int,
    stat: *mut i32,
    errmsg: *mut std::os::raw::c_char,
    errmsg_len: c_int,
) {
    let Some(dst) = dst.as_mut() else {
        report(Err::<(), _>(CafError::BaseAddrNull), stat, errmsg, errmsg_len);
        return;
    };
    let result = with_runtime(|rt| {
        let self_image = rt.self_image();
        let src = endpoint(rt, TokenId(src_token), ImageId(src_image), src_offset, dst.type_kind)?;
        cafrt_transfer::get(self_image, dst, &src, may_require_temp != 0)
    });
    report(result, stat, errmsg, errmsg_len);
}

/// `spec.md` §6 `sendget`: remote-to-remote, staged through a local
/// temporary.
#[no_mangle]
pub unsafe extern "C" fn caf_sendget(
    dst_token: u64,
    dst_image: c_int,
    dst_offset: isize,
    dst_type: TypeKind,
    src_token: u64,
    src_image: c_int,
    src_offset: isize,
    src_type: TypeKind,
    elem_count: usize,
    stat: *mut i32,
    errmsg: *mut std::os::raw::c_char,
    errmsg_len: c_int,
) {
    let result = with_runtime(|rt| {
        let self_image = rt.self_image();
        let dst = endpoint(rt, TokenId(dst_token), ImageId(dst_image), dst_offset, dst_type)?;
        let src = endpoint(rt, TokenId(src_token), ImageId(src_image), src_offset, src_type)?;
        cafrt_transfer::sendget(self_image, &dst, &src, elem_count)
    });
    report(result, stat, errmsg, errmsg_len);
}

/// `spec.md` §6 `is_present`: whether a pointer/allocatable component is
/// associated, i.e. whether its token's base address is non-null.
#[no_mangle]
pub unsafe extern "C" fn caf_is_present(token: u64) -> c_int {
    with_runtime(|rt| Ok(!rt.window.registry().get(TokenId(token))?.data_ptr().is_null()))
        .map(|present| present as c_int)
        .unwrap_or(0)
}

/// # Safety
/// `chain` must point to `chain_len` valid [`RefNode`]s; `dst` to a fully
/// shaped [`Descriptor`] sized by a prior call to the shape computation
/// this entry point's caller is expected to perform (`spec.md` §4.E "Pass
/// 1").
#[no_mangle]
pub unsafe extern "C" fn caf_get_by_ref(
    token: u64,
    image: c_int,
    chain: *const RefNode,
    chain_len: usize,
    dst: *mut Descriptor,
    stat: *mut i32,
    errmsg: *mut std::os::raw::c_char,
    errmsg_len: c_int,
) {
    let Some(dst) = dst.as_mut() else {
        report(Err::<(), _>(CafError::BaseAddrNull), stat, errmsg, errmsg_len);
        return;
    };
    let chain = std::slice::from_raw_parts(chain, chain_len);
    let result = with_runtime(|rt| {
        let token = TokenId(token);
        let named = window_for_token(rt, token)?;
        let global = rt.window.registry().global_dynamic_window();
        let access = crate::remote_access::WindowAccess::new(ImageId(image), named, global);
        cafrt_refchain::get_by_ref(&access, chain, dst)
    });
    report(result, stat, errmsg, errmsg_len);
}

/// # Safety
/// See [`caf_get_by_ref`]; `src` plays `dst`'s role but is read, not
/// written.
#[no_mangle]
pub unsafe extern "C" fn caf_send_by_ref(
    token: u64,
    image: c_int,
    chain: *const RefNode,
    chain_len: usize,
    src: *const Descriptor,
    stat: *mut i32,
    errmsg: *mut std::os::raw::c_char,
    errmsg_len: c_int,
) {
    let Some(src) = src.as_ref() else {
        report(Err::<(), _>(CafError::BaseAddrNull), stat, errmsg, errmsg_len);
        return;
    };
    let chain = std::slice::from_raw_parts(chain, chain_len);
    let result = with_runtime(|rt| {
        let token = TokenId(token);
        let named = window_for_token(rt, token)?;
        let global = rt.window.registry().global_dynamic_window();
        let access = crate::remote_access::WindowAccess::new(ImageId(image), named, global);
        cafrt_refchain::send_by_ref(&access, chain, src)
    });
    report(result, stat, errmsg, errmsg_len);
}

/// `spec.md` §6 `sendget_by_ref` / §9 Open Question: materializes through
/// `scratch` via `get_by_ref` then `send_by_ref`, matching `SPEC_FULL.md`
/// §9's note that the source itself calls this path "mostly unfunctional"
/// outside the accessor machinery. Callers whose code generator routes
/// through accessors instead should call `transfer_between_remotes`
/// (`abi_channel.rs`) directly rather than this entry point.
///
/// # Safety
/// Same as [`caf_get_by_ref`]/[`caf_send_by_ref`], applied to both chains.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn caf_sendget_by_ref(
    dst_token: u64,
    dst_image: c_int,
    dst_chain: *const RefNode,
    dst_chain_len: usize,
    src_token: u64,
    src_image: c_int,
    src_chain: *const RefNode,
    src_chain_len: usize,
    scratch: *mut Descriptor,
    stat: *mut i32,
    errmsg: *mut std::os::raw::c_char,
    errmsg_len: c_int,
) {
    let Some(scratch) = scratch.as_mut() else {
        report(Err::<(), _>(CafError::BaseAddrNull), stat, errmsg, errmsg_len);
        return;
    };
    let dst_chain = std::slice::from_raw_parts(dst_chain, dst_chain_len);
    let src_chain = std::slice::from_raw_parts(src_chain, src_chain_len);

    let result = with_runtime(|rt| {
        let src_named = window_for_token(rt, TokenId(src_token))?;
        let global = rt.window.registry().global_dynamic_window();
        let src_access = crate::remote_access::WindowAccess::new(ImageId(src_image), src_named, global);
        cafrt_refchain::get_by_ref(&src_access, src_chain, scratch)?;

        let dst_named = window_for_token(rt, TokenId(dst_token))?;
        let dst_access = crate::remote_access::WindowAccess::new(ImageId(dst_image), dst_named, global);
        cafrt_refchain::send_by_ref(&dst_access, dst_chain, scratch)
    });
    report(result, stat, errmsg, errmsg_len);
}
