/// An opaque reference to a node on the team stack, returned by
/// [`crate::TeamStack::form_team`] and accepted by `change_team`/`sync_team`
/// (`spec.md` §4.C). Stable for the lifetime of the formed team; indices are
/// never reused because [`crate::TeamStack`] only appends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TeamHandle(pub(crate) i64);

impl TeamHandle {
    /// Recovers a handle from the opaque `i64` an ABI caller stored after
    /// a prior `form_team`/`get_team` call.
    pub fn from_raw(raw: i64) -> Self {
        TeamHandle(raw)
    }

    pub fn as_raw(self) -> i64 {
        self.0
    }
}
