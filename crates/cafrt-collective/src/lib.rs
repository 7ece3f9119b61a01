//! Component G: sync, collectives, atomics, locks and events.
//!
//! Everything here is a thin, stateless wrapper over either a plain MPI
//! collective call or a one-sided primitive from [`cafrt_window::RmaWindow`]
//! — this crate owns no persistent state of its own; callers (the
//! top-level `cafrt` crate) supply the communicator and window handles for
//! each call (`spec.md` §4.G).

mod atomic;
mod broadcast;
mod event;
mod lock;
mod mpi_datatype;
mod reduce;
mod sync;

pub use atomic::{atomic_cas, atomic_define, atomic_op, atomic_ref, AtomicOp};
pub use broadcast::co_broadcast;
pub use event::{event_post, event_query, event_wait};
pub use lock::{lock, unlock};
pub use mpi_datatype::to_mpi_datatype;
pub use reduce::{co_max, co_min, co_reduce, co_sum, UserReduceFn};
pub use sync::{sync_all, sync_images};
