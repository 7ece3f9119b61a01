//! The process-wide image-status window (`spec.md` §4.B "Failure policy",
//! §7 tier 2, §9 "Global mutable state").
//!
//! One byte per image, exposed as an ordinary RMA window. An image
//! publishes its own status by putting its [`ImageStatus::to_wire`] byte
//! into every peer's copy of the window at its own slot; a query reads the
//! locally-held copy rather than issuing a fresh `Get`, since publication
//! is eager (`spec.md` §7: "updates are broadcast eagerly on image
//! termination").

use cafrt_core::{CafError, ImageStatus};
use mpi::topology::{Communicator, SimpleCommunicator};

use crate::rma::RmaWindow;
use crate::{allocate_zeroed, deallocate};

pub struct ImageStatusWindow {
    window: RmaWindow,
    base: *mut u8,
    size: usize,
}

// SAFETY: `base` is heap memory we allocated and exposed through `window`;
// it is only ever touched one byte at a time under the window's own
// lock/unlock epochs or, for the local read in `query`, by a plain atomic
// byte load that races benignly with concurrent single-byte writes.
unsafe impl Send for ImageStatusWindow {}
unsafe impl Sync for ImageStatusWindow {}

impl ImageStatusWindow {
    pub fn new(comm: &SimpleCommunicator) -> Result<Self, CafError> {
        let size = comm.size().max(1) as usize;
        let base = allocate_zeroed(size)?;
        let window = match RmaWindow::create(comm, base, size) {
            Ok(w) => w,
            Err(e) => {
                unsafe { deallocate(base, size) };
                return Err(e);
            }
        };
        Ok(ImageStatusWindow { window, base, size })
    }

    /// Publishes `status` for `self_rank` into every peer's copy of the
    /// window, then updates the local copy too.
    pub fn publish(&self, self_rank: i32, status: ImageStatus) -> Result<(), CafError> {
        let byte = [status.to_wire()];
        for peer in 0..self.size as i32 {
            if peer == self_rank {
                continue;
            }
            self.window.put(peer, self_rank as isize, &byte)?;
        }
        unsafe { *self.base.add(self_rank as usize) = status.to_wire() };
        Ok(())
    }

    /// Reads the locally-held copy of `image_rank`'s status.
    pub fn query(&self, image_rank: i32) -> ImageStatus {
        if !in_range(image_rank, self.size) {
            return ImageStatus::Alive;
        }
        let byte = unsafe { *self.base.add(image_rank as usize) };
        ImageStatus::from_wire(byte)
    }

    /// All images currently observed as `Stopped`, 1-based (`spec.md` §6
    /// `stopped_images`).
    pub fn stopped(&self) -> Vec<i32> {
        self.matching(ImageStatus::Stopped)
    }

    /// All images currently observed as `Failed` (`spec.md` §6
    /// `failed_images`).
    pub fn failed(&self) -> Vec<i32> {
        self.matching(ImageStatus::Failed)
    }

    fn matching(&self, target: ImageStatus) -> Vec<i32> {
        (0..self.size as i32)
            .filter(|&rank| self.query(rank) == target)
            .map(|rank| rank + 1)
            .collect()
    }
}

fn in_range(rank: i32, size: usize) -> bool {
    rank >= 0 && (rank as usize) < size
}

impl Drop for ImageStatusWindow {
    fn drop(&mut self) {
        unsafe { deallocate(self.base, self.size) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_check_rejects_negative_and_oversized_ranks() {
        assert!(!in_range(-1, 4));
        assert!(!in_range(4, 4));
        assert!(in_range(0, 4));
        assert!(in_range(3, 4));
    }
}
