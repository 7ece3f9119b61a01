use std::sync::Arc;

use cafrt_descriptor::Descriptor;

use crate::rma::RmaWindow;

/// Registration kind requested by the caller (`spec.md` §4.B `register`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterKind {
    Static,
    Allocatable,
    LockStatic,
    LockAlloc,
    Critical,
    EventStatic,
    EventAlloc,
    ComponentRegisterOnly,
    ComponentAllocateOnly,
}

impl RegisterKind {
    /// Lock/event kinds store `size * sizeof(int)` zeroed ints rather than
    /// the caller's element type (`spec.md` §4.B).
    pub fn is_lock_or_event(self) -> bool {
        matches!(
            self,
            RegisterKind::LockStatic
                | RegisterKind::LockAlloc
                | RegisterKind::Critical
                | RegisterKind::EventStatic
                | RegisterKind::EventAlloc
        )
    }

    /// Component kinds attach to the global dynamic window instead of
    /// creating their own named window (`spec.md` §4.B, §3 "Slave token").
    pub fn is_component(self) -> bool {
        matches!(
            self,
            RegisterKind::ComponentRegisterOnly | RegisterKind::ComponentAllocateOnly
        )
    }
}

/// `spec.md` §4.B `deregister` mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeregisterMode {
    Full,
    DataOnly,
}

/// A unique, process-local identifier for a registered token; used as the
/// key in the window manager's registries and as the opaque `caf_token_t`
/// on the ABI boundary (where it is cast to/from a raw pointer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u64);

/// `spec.md` §3 "Token": a primary token owns its window; a slave token is
/// attached to the global dynamic window and nested inside a containing
/// primary token's lifetime.
pub enum Token {
    Primary {
        data_ptr: *mut u8,
        window: Arc<RmaWindow>,
        descriptor: Option<Descriptor>,
        size: usize,
    },
    Slave {
        data_ptr: *mut u8,
        descriptor: Option<Descriptor>,
        size: usize,
        /// The primary token this slave is nested inside, per `spec.md` §3
        /// "Ownership summary": a slave token's attachment lifetime is
        /// bounded by its containing primary token.
        parent: TokenId,
    },
}

// SAFETY: see `RmaWindow`'s safety note; a Token's raw pointer is either
// heap memory we allocated ourselves or a pointer handed to us by the
// caller at registration time, and is only ever dereferenced by the
// transfer/refchain crates under the runtime's own synchronization.
unsafe impl Send for Token {}
unsafe impl Sync for Token {}

impl Token {
    pub fn data_ptr(&self) -> *mut u8 {
        match self {
            Token::Primary { data_ptr, .. } => *data_ptr,
            Token::Slave { data_ptr, .. } => *data_ptr,
        }
    }

    pub fn descriptor(&self) -> Option<&Descriptor> {
        match self {
            Token::Primary { descriptor, .. } => descriptor.as_ref(),
            Token::Slave { descriptor, .. } => descriptor.as_ref(),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Token::Primary { size, .. } => *size,
            Token::Slave { size, .. } => *size,
        }
    }

    pub fn window(&self) -> Option<&Arc<RmaWindow>> {
        match self {
            Token::Primary { window, .. } => Some(window),
            Token::Slave { .. } => None,
        }
    }
}
