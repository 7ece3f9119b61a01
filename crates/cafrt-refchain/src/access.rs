//! The one seam the reference-chain interpreter needs into the rest of the
//! runtime: fetching a remote descriptor or pointer, and moving raw bytes
//! to/from a `(space, offset)` address on the target image.
//!
//! Kept as a trait so this crate never touches MPI directly — the
//! top-level `cafrt` crate supplies the implementation, wiring it to
//! `cafrt-window`'s named and global dynamic windows.

use cafrt_core::{CafError, ImageId};
use cafrt_descriptor::Descriptor;

/// Which window an offset is relative to. A chain starts in `Named` (the
/// token's own registered window) and switches permanently to `Global`
/// the first time it crosses a component with `token_sub_offset > 0`
/// (`spec.md` §4.E "Pass 1").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Space {
    Named,
    Global,
}

pub trait RemoteAccess {
    fn image(&self) -> ImageId;

    /// Fetches the remote descriptor living at `offset` in `space`. Never
    /// cached by the caller between refs — remote descriptors may change
    /// between calls (`spec.md` §4.E "Orderings and tie-breaks").
    fn fetch_descriptor(&self, space: Space, offset: isize) -> Result<Descriptor, CafError>;

    /// Reads a pointer-sized value at `offset` and returns it as a fresh
    /// byte offset into the global dynamic window (`spec.md` §4.E
    /// "Component with token_sub_offset > 0").
    fn fetch_pointer(&self, space: Space, offset: isize) -> Result<isize, CafError>;

    fn get_bytes(&self, space: Space, offset: isize, buf: &mut [u8]) -> Result<(), CafError>;

    fn put_bytes(&self, space: Space, offset: isize, buf: &[u8]) -> Result<(), CafError>;
}
