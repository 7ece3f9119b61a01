//! The coarray runtime's stable C ABI (`spec.md` §6).
//!
//! This crate wires components A–G (in `cafrt-descriptor`, `cafrt-window`,
//! `cafrt-team`, `cafrt-transfer`, `cafrt-refchain`, `cafrt-channel`,
//! `cafrt-collective`) together behind the fixed entry-point names the
//! compiler's code generator emits calls to. Every `abi_*` module covers
//! one group of entry points from `spec.md` §6; `runtime` owns the single
//! process-wide [`runtime::Runtime`] all of them reach through, and `stat`
//! is the one place a [`cafrt_core::CafError`] is collapsed down to a
//! `stat`/`errmsg` pair or a process abort (`spec.md` §7).
//!
//! `PREFIX_NAME` (`spec.md` §6 "Environment") is applied by the build
//! script / linker stage that emits the final symbol names for these
//! `#[no_mangle]` functions, not by this crate at runtime; see
//! [`cafrt_core::Config::entry_point_name`] for the naming rule a caller
//! that drives codegen directly should follow.

mod abi_channel;
mod abi_collective;
mod abi_image;
mod abi_lifecycle;
mod abi_sync;
mod abi_team;
mod abi_transfer;
mod remote_access;
mod runtime;
mod stat;
mod wire;
