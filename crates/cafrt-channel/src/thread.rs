//! The communication thread (`spec.md` §4.F "Thread main loop", §5
//! "Scheduling model").
//!
//! Each image spawns one thread bound to a private duplicate of the job
//! communicator. It probes for a message, receives it into a stack-sized
//! buffer (heap fallback for anything larger), and dispatches by `cmd`.
//! Requests addressed to `self` bypass the channel entirely
//! (`spec.md` §4.F "Self-optimization") — that shortcut lives in
//! [`crate::Channel`], not here, since it never touches the wire.

use std::os::raw::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;

use cafrt_core::CafError;
use mpi::ffi;
use smallvec::SmallVec;

use crate::accessor::{Accessor, AccessorTable};
use crate::header::{Command, Flags, Header, HEADER_LEN};
use crate::running::RunningAccessList;

/// Inline capacity for the receive buffer before spilling to the heap,
/// mirroring the `alloca`-with-heap-spill idiom used for the transfer
/// engine's staging buffer (`spec.md` §4.D, §4.F "receive into a stack
/// buffer (heap fallback)").
const INLINE_RECV: usize = 4096;

/// A channel request tag reserved so ordinary sync traffic is never
/// misrouted onto the duplicated communicator (`spec.md` §5 "Scheduling
/// model").
pub const CHANNEL_TAG: i32 = 0x43_41_46; // "CAF"

/// Handle to the running communication thread. Dropping it does not stop
/// the thread; call [`CommThread::shutdown`] explicitly during `finalize`.
pub struct CommThread {
    raw_comm: ffi::MPI_Comm,
    handle: Option<JoinHandle<()>>,
    stopping: Arc<AtomicBool>,
    self_rank: i32,
}

// SAFETY: an MPI_Comm duplicate is safe to hand to exactly one other
// thread as long as neither side issues overlapping calls on it; here the
// owning thread only ever sends the termination message after the comm
// thread has observed `stopping`.
unsafe impl Send for CommThread {}

impl CommThread {
    /// Spawns the communication thread over a fresh duplicate of `comm`.
    pub fn spawn(
        comm: ffi::MPI_Comm,
        self_rank: i32,
        table: Arc<RwLock<AccessorTable>>,
        running: Arc<RunningAccessList>,
    ) -> Result<Self, CafError> {
        let mut dup: ffi::MPI_Comm = std::ptr::null_mut();
        let rc = unsafe { ffi::MPI_Comm_dup(comm, &mut dup) };
        check(rc)?;

        let stopping = Arc::new(AtomicBool::new(false));
        let thread_stopping = stopping.clone();
        let thread_comm = RawComm(dup);

        let handle = std::thread::Builder::new()
            .name("cafrt-channel".into())
            .spawn(move || main_loop(thread_comm, thread_stopping, table, running))
            .map_err(|e| CafError::Fatal(format!("failed to spawn comm thread: {e}")))?;

        Ok(CommThread {
            raw_comm: dup,
            handle: Some(handle),
            stopping,
            self_rank,
        })
    }

    pub fn raw(&self) -> ffi::MPI_Comm {
        self.raw_comm
    }

    /// Sends the zero-length termination message and joins the thread
    /// (`spec.md` §4.F "A termination message ... ends the thread at
    /// finalize").
    pub fn shutdown(&mut self) -> Result<(), CafError> {
        self.stopping.store(true, Ordering::SeqCst);
        let header = Header::termination(self.self_rank);
        let wire = header.encode();
        let rc = unsafe {
            ffi::MPI_Send(
                wire.as_ptr() as *const c_void,
                wire.len() as i32,
                ffi::RSMPI_BYTE,
                self.self_rank,
                CHANNEL_TAG,
                self.raw_comm,
            )
        };
        check(rc)?;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

impl Drop for CommThread {
    fn drop(&mut self) {
        if !self.raw_comm.is_null() {
            unsafe {
                ffi::MPI_Comm_free(&mut self.raw_comm);
            }
        }
    }
}

/// A raw `MPI_Comm` wrapped so it can be moved into the spawned thread's
/// closure; see [`CommThread`]'s safety note.
struct RawComm(ffi::MPI_Comm);
unsafe impl Send for RawComm {}

fn main_loop(
    comm: RawComm,
    stopping: Arc<AtomicBool>,
    table: Arc<RwLock<AccessorTable>>,
    running: Arc<RunningAccessList>,
) {
    let comm = comm.0;
    loop {
        let mut flag: i32 = 0;
        let mut status: ffi::MPI_Status = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            ffi::MPI_Iprobe(
                ffi::RSMPI_ANY_SOURCE,
                CHANNEL_TAG,
                comm,
                &mut flag,
                &mut status,
            )
        };
        if rc != ffi::MPI_SUCCESS as i32 {
            log::error!("cafrt-channel: MPI_Iprobe failed with code {rc}");
            return;
        }
        if flag == 0 {
            if stopping.load(Ordering::SeqCst) {
                return;
            }
            std::thread::yield_now();
            continue;
        }

        let mut count: i32 = 0;
        unsafe { ffi::MPI_Get_count(&status, ffi::RSMPI_BYTE, &mut count) };
        let mut buf: SmallVec<[u8; INLINE_RECV]> = SmallVec::new();
        buf.resize(count.max(0) as usize, 0);
        let source = status.MPI_SOURCE;
        let rc = unsafe {
            ffi::MPI_Recv(
                buf.as_mut_ptr() as *mut c_void,
                count,
                ffi::RSMPI_BYTE,
                source,
                CHANNEL_TAG,
                comm,
                ffi::RSMPI_STATUS_IGNORE,
            )
        };
        if rc != ffi::MPI_SUCCESS as i32 {
            log::error!("cafrt-channel: MPI_Recv failed with code {rc}");
            continue;
        }

        let Some(header) = Header::decode(&buf) else {
            log::error!("cafrt-channel: malformed header from rank {source}");
            continue;
        };
        if header.is_termination() {
            return;
        }

        let payload = &buf[HEADER_LEN..];
        dispatch(comm, source, &header, payload, &table, &running);
    }
}

fn dispatch(
    comm: ffi::MPI_Comm,
    source: i32,
    header: &Header,
    payload: &[u8],
    table: &RwLock<AccessorTable>,
    running: &RunningAccessList,
) {
    let add_data = if header.ra_id != 0 {
        running
            .get(cafrt_core::RunningAccessId(header.ra_id))
            .map(|e| e.add_data)
            .unwrap_or_default()
    } else {
        payload.to_vec()
    };

    let table_guard = table.read().expect("accessor table lock poisoned");
    let accessor = match table_guard.get(header.accessor_index as usize) {
        Ok(a) => *a,
        Err(e) => {
            log::error!("cafrt-channel: {e}");
            return;
        }
    };
    drop(table_guard);

    match (header.cmd, accessor) {
        (Command::Get, Accessor::Getter(f)) => {
            let reply = f(&add_data);
            send_reply(comm, source, header.dest_tag, &reply);
        }
        (Command::Present, Accessor::Predicate(f)) => {
            let present = f(&add_data);
            send_reply(comm, source, header.dest_tag, &[present as u8]);
        }
        (Command::Send, Accessor::Receiver(f)) => {
            let data_start = if header.ra_id != 0 { 0 } else { add_data.len() };
            let data = if header.ra_id != 0 { payload } else { &payload[data_start.min(payload.len())..] };
            f(&add_data, data);
            send_reply(comm, source, header.dest_tag, &[1u8]);
        }
        (Command::Transfer, Accessor::Getter(f)) => {
            // Compose a new `send` request for the third image and
            // forward it (`spec.md` §4.F "transfer: compose a new send
            // request for a third image and forward it").
            let fetched = f(&add_data);
            let forward = Header {
                cmd: Command::Send,
                flags: header.flags & !Flags::TRANSFER_DESC,
                transfer_size: fetched.len() as u64,
                opt_charlen: header.dest_opt_charlen,
                win: header.win,
                dest_image: header.dest_image,
                dest_tag: header.dest_tag,
                accessor_index: header.accessor_index,
                ra_id: 0,
                dest_opt_charlen: header.dest_opt_charlen,
            };
            send_request(comm, header.dest_image, &forward, &fetched);
        }
        _ => {
            log::error!(
                "cafrt-channel: accessor kind does not match cmd {:?}",
                header.cmd
            );
        }
    }
}

fn send_reply(comm: ffi::MPI_Comm, dest: i32, tag: i32, data: &[u8]) {
    let rc = unsafe {
        ffi::MPI_Send(
            data.as_ptr() as *const c_void,
            data.len() as i32,
            ffi::RSMPI_BYTE,
            dest,
            tag,
            comm,
        )
    };
    if rc != ffi::MPI_SUCCESS as i32 {
        log::error!("cafrt-channel: reply send to rank {dest} failed with code {rc}");
    }
}

fn send_request(comm: ffi::MPI_Comm, dest: i32, header: &Header, payload: &[u8]) {
    let wire = header.encode();
    let mut message = Vec::with_capacity(wire.len() + payload.len());
    message.extend_from_slice(&wire);
    message.extend_from_slice(payload);
    let rc = unsafe {
        ffi::MPI_Send(
            message.as_ptr() as *const c_void,
            message.len() as i32,
            ffi::RSMPI_BYTE,
            dest,
            CHANNEL_TAG,
            comm,
        )
    };
    if rc != ffi::MPI_SUCCESS as i32 {
        log::error!("cafrt-channel: request send to rank {dest} failed with code {rc}");
    }
}

pub(crate) fn check(rc: i32) -> Result<(), CafError> {
    if rc == ffi::MPI_SUCCESS as i32 {
        Ok(())
    } else {
        Err(CafError::Mpi(rc))
    }
}

/// Blocks for a reply addressed to `tag` on `comm`, the caller-side half
/// of the "coroutine-like control" described in `spec.md` §9: send a
/// request, then probe/recv in a bounded loop for the matching reply.
pub fn recv_reply(comm: ffi::MPI_Comm, source: i32, tag: i32) -> Result<Vec<u8>, CafError> {
    let mut status: ffi::MPI_Status = unsafe { std::mem::zeroed() };
    let rc = unsafe { ffi::MPI_Probe(source, tag, comm, &mut status) };
    check(rc)?;
    let mut count: i32 = 0;
    unsafe { ffi::MPI_Get_count(&status, ffi::RSMPI_BYTE, &mut count) };
    let mut buf = vec![0u8; count.max(0) as usize];
    let rc = unsafe {
        ffi::MPI_Recv(
            buf.as_mut_ptr() as *mut c_void,
            count,
            ffi::RSMPI_BYTE,
            source,
            tag,
            comm,
            ffi::RSMPI_STATUS_IGNORE,
        )
    };
    check(rc)?;
    Ok(buf)
}

pub fn send_message(comm: ffi::MPI_Comm, dest: i32, header: &Header, payload: &[u8]) -> Result<(), CafError> {
    let wire = header.encode();
    let mut message = Vec::with_capacity(wire.len() + payload.len());
    message.extend_from_slice(&wire);
    message.extend_from_slice(payload);
    let rc = unsafe {
        ffi::MPI_Send(
            message.as_ptr() as *const c_void,
            message.len() as i32,
            ffi::RSMPI_BYTE,
            dest,
            CHANNEL_TAG,
            comm,
        )
    };
    check(rc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_tag_is_stable() {
        assert_eq!(CHANNEL_TAG, 0x4341_46);
    }
}
