//! Identity types shared across components.
//!
//! Image numbering is 1-based, matching Fortran `this_image()`/`num_images()`
//! conventions (`spec.md` §3 "Image identity"). We keep the 1-based
//! convention at the type boundary rather than translating to 0-based
//! everywhere, since the ABI is the thing compared against in generated
//! Fortran code and off-by-one drift there is a real foot-gun.

/// A 1-based image number, local to whatever team is current when it was
/// obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageId(pub i32);

impl ImageId {
    pub fn as_rank(self) -> i32 {
        self.0 - 1
    }

    pub fn from_rank(rank: i32) -> Self {
        ImageId(rank + 1)
    }
}

/// An opaque team identifier as formed by `form_team` (`spec.md` §4.C).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TeamId(pub i64);

/// A monotonically increasing id naming one in-flight remote-function
/// request (`spec.md` §3 "Running accesses").
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunningAccessId(pub u64);

/// Which of the three well-known team levels a caller is asking for
/// (`spec.md` §4.C `get_team`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TeamLevel {
    Initial,
    Parent,
    Current,
}
