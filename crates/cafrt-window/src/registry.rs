use std::sync::atomic::{AtomicU64, Ordering};

use cafrt_core::CafError;
use indexmap::IndexMap;

use crate::rma::RmaWindow;
use crate::token::{Token, TokenId};

/// Owns every live token plus the process-wide global dynamic window that
/// slave tokens attach to (`spec.md` §3 "Token", §4.B).
///
/// `form_team`/`change_team` does not create a new `TokenRegistry`; the
/// team stack (component C) instead tracks, per team node, which
/// [`TokenId`]s were registered while that team was current, so that
/// `end_team` can ask this registry to deregister exactly that subset
/// (`spec.md` §3 "Team stack").
pub struct TokenRegistry {
    tokens: IndexMap<TokenId, Token>,
    next_id: AtomicU64,
    global_dynamic_window: RmaWindow,
}

impl TokenRegistry {
    pub fn new(global_dynamic_window: RmaWindow) -> Self {
        TokenRegistry {
            tokens: IndexMap::new(),
            next_id: AtomicU64::new(1),
            global_dynamic_window,
        }
    }

    pub fn global_dynamic_window(&self) -> &RmaWindow {
        &self.global_dynamic_window
    }

    pub fn fresh_id(&self) -> TokenId {
        TokenId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn insert(&mut self, id: TokenId, token: Token) {
        self.tokens.insert(id, token);
    }

    pub fn get(&self, id: TokenId) -> Result<&Token, CafError> {
        self.tokens
            .get(&id)
            .ok_or_else(|| CafError::Fatal(format!("unknown token {:?}", id)))
    }

    pub fn get_mut(&mut self, id: TokenId) -> Result<&mut Token, CafError> {
        self.tokens
            .get_mut(&id)
            .ok_or_else(|| CafError::Fatal(format!("unknown token {:?}", id)))
    }

    /// Removes and returns a token (`spec.md` §4.B `deregister`, `full` mode).
    pub fn remove(&mut self, id: TokenId) -> Result<Token, CafError> {
        self.tokens
            .shift_remove(&id)
            .ok_or_else(|| CafError::Fatal(format!("unknown token {:?}", id)))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
