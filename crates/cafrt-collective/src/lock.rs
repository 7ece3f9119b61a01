//! `lock` / `unlock` (`spec.md` §4.G): a compare-and-swap mutex held in a
//! single `int` slot of the lock window.

use std::thread;
use std::time::Duration;

use cafrt_core::{status, CafError, ImageId};
use cafrt_window::RmaWindow;

/// Sentinel stored in the lock slot when no image holds it.
const UNLOCKED: i32 = 0;

/// `spec.md` §4.G `lock`: spins a compare-and-swap against `UNLOCKED` on
/// `(win, target_rank, offset)`, backing off by `backoff` between attempts.
/// `acquiring_image` is this image's id, written into the slot on success so
/// a racing image can tell who holds it. `peer_failed` lets the caller break
/// the spin when the lock's owning image is detected as failed (`spec.md`
/// §4.G "fail-image detection breaks the spin").
pub fn lock(
    win: &RmaWindow,
    target_rank: i32,
    offset: isize,
    acquiring_image: ImageId,
    backoff: Duration,
    peer_failed: impl Fn() -> bool,
) -> Result<i32, CafError> {
    loop {
        let previous = win.compare_and_swap_i32(target_rank, offset, UNLOCKED, acquiring_image.0)?;
        if previous == UNLOCKED {
            return Ok(status::SUCCESS);
        }
        if peer_failed() {
            return Err(CafError::FailedImage(target_rank + 1));
        }
        thread::sleep(backoff);
    }
}

/// `spec.md` §4.G `unlock`: releases the slot, verifying the caller was
/// actually the holder.
pub fn unlock(win: &RmaWindow, target_rank: i32, offset: isize, releasing_image: ImageId) -> Result<i32, CafError> {
    let previous = win.compare_and_swap_i32(target_rank, offset, releasing_image.0, UNLOCKED)?;
    if previous == releasing_image.0 {
        Ok(status::STAT_UNLOCKED)
    } else {
        Ok(status::STAT_LOCKED_OTHER_IMAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlocked_sentinel_is_zero() {
        assert_eq!(UNLOCKED, 0);
    }
}
