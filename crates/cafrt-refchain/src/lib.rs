//! Component E: the reference-chain interpreter.
//!
//! Walks a linked list of component/array refs across possibly several
//! remote dereferences, computing the target descriptor and per-element
//! addresses, and driving gets/sends by ref (`spec.md` §4.E). Implemented
//! as two passes: [`pass1::run`] computes shape and reallocation, and
//! [`pass2::get_by_ref`]/[`pass2::send_by_ref`] do the actual transfer.

pub mod access;
mod node;
mod pass1;
mod pass2;

pub use access::{RemoteAccess, Space};
pub use node::{array_ref_count, DimSelector, RefChain, RefNode};
pub use pass1::{run as compute_shape, Shape};
pub use pass2::{get_by_ref, send_by_ref};
