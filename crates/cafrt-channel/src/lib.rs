//! Component F: the remote-function channel.
//!
//! Each image spawns one communication thread bound to a private
//! duplicate of the job communicator (`spec.md` §4.F, §5). Accessors are
//! statically registered functions, identified by an integer hash, that
//! the thread on a remote image executes to fetch, test-presence, store,
//! or transfer values.

mod accessor;
mod channel;
mod header;
mod running;
mod thread;

pub use accessor::{Accessor, AccessorTable, GetterFn, PredicateFn, ReceiverFn};
pub use channel::Channel;
pub use header::{Command, Flags, Header, HEADER_LEN};
pub use running::{RunningAccess, RunningAccessList};
pub use thread::CHANNEL_TAG;
