//! `sync_all` and `sync_images` (`spec.md` §4.G).

use std::os::raw::c_void;

use cafrt_core::{status, CafError, ImageId};
use mpi::ffi;
use mpi::raw::AsRaw;
use mpi::topology::{Communicator, SimpleCommunicator};

/// `spec.md` §4.G `sync_all`: barrier on `comm` after the caller has
/// flushed its pending puts. Flushing is the caller's job (the pending-put
/// queue lives in `cafrt-window`); this just issues the barrier.
pub fn sync_all(comm: &SimpleCommunicator) -> Result<(), CafError> {
    comm.barrier();
    Ok(())
}

/// `spec.md` §4.G `sync_images(list)`: pairwise rendezvous with each image
/// in `peers`. Every call posts one non-blocking send and one non-blocking
/// receive of a single sentinel int per peer, then waits on all of them;
/// a peer that has already stopped reports `STAT_STOPPED_IMAGE` instead of
/// the normal sentinel and that aborts the whole wait with that stat
/// (`spec.md` §8 boundary behavior: empty list is a no-op, duplicate images
/// return `STAT_DUP_SYNC_IMAGES`).
pub fn sync_images(comm: &SimpleCommunicator, self_image: ImageId, peers: &[ImageId]) -> Result<(), CafError> {
    if peers.is_empty() {
        return Ok(());
    }
    check_no_duplicates(peers)?;

    let raw = comm.as_raw();
    let sentinel: i32 = status::SUCCESS;
    let mut send_reqs = Vec::with_capacity(peers.len());
    let mut recv_bufs = vec![0i32; peers.len()];
    let mut recv_reqs = Vec::with_capacity(peers.len());

    for peer in peers {
        let mut req: ffi::MPI_Request = std::ptr::null_mut();
        let rc = unsafe {
            ffi::MPI_Isend(
                &sentinel as *const i32 as *const c_void,
                1,
                ffi::RSMPI_INT32_T,
                peer.as_rank(),
                SYNC_IMAGES_TAG,
                raw,
                &mut req,
            )
        };
        check(rc)?;
        send_reqs.push(req);
    }
    for (i, peer) in peers.iter().enumerate() {
        let mut req: ffi::MPI_Request = std::ptr::null_mut();
        let rc = unsafe {
            ffi::MPI_Irecv(
                &mut recv_bufs[i] as *mut i32 as *mut c_void,
                1,
                ffi::RSMPI_INT32_T,
                peer.as_rank(),
                SYNC_IMAGES_TAG,
                raw,
                &mut req,
            )
        };
        check(rc)?;
        recv_reqs.push(req);
    }

    wait_all(&mut send_reqs)?;
    wait_all(&mut recv_reqs)?;

    for (peer, value) in peers.iter().zip(recv_bufs.iter()) {
        if *value == status::STAT_STOPPED_IMAGE {
            log::debug!("sync_images: peer image {} reported stopped", peer.0);
            return Err(CafError::StoppedImage(peer.0));
        }
    }

    let _ = self_image;
    Ok(())
}

const SYNC_IMAGES_TAG: i32 = 0x53_59_4e; // "SYN"

fn wait_all(reqs: &mut [ffi::MPI_Request]) -> Result<(), CafError> {
    for req in reqs.iter_mut() {
        let mut status: ffi::MPI_Status = unsafe { std::mem::zeroed() };
        let rc = unsafe { ffi::MPI_Wait(req, &mut status) };
        check(rc)?;
    }
    Ok(())
}

fn check_no_duplicates(peers: &[ImageId]) -> Result<(), CafError> {
    for i in 0..peers.len() {
        for j in (i + 1)..peers.len() {
            if peers[i] == peers[j] {
                return Err(CafError::DupSyncImages);
            }
        }
    }
    Ok(())
}

fn check(rc: i32) -> Result<(), CafError> {
    if rc == ffi::MPI_SUCCESS as i32 {
        Ok(())
    } else {
        Err(CafError::Mpi(rc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_has_no_duplicates() {
        assert!(check_no_duplicates(&[]).is_ok());
    }

    #[test]
    fn distinct_images_pass() {
        let peers = [ImageId(2), ImageId(3), ImageId(4)];
        assert!(check_no_duplicates(&peers).is_ok());
    }

    #[test]
    fn duplicate_image_is_rejected() {
        let peers = [ImageId(2), ImageId(3), ImageId(2)];
        assert!(matches!(check_no_duplicates(&peers), Err(CafError::DupSyncImages)));
    }
}
