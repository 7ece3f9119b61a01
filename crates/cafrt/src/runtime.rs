//! Process-wide runtime state (`spec.md` §9 "Global mutable state").
//!
//! `init` builds a [`Runtime`] and stores it in [`RUNTIME`]; `finalize` tears
//! it down in reverse. Every ABI entry point in the `abi_*` modules reaches
//! the runtime through [`with_runtime`]/[`with_runtime_mut`] rather than
//! touching global state directly, keeping that lifecycle boundary in one
//! place as `spec.md` §9 asks for.

use std::sync::Mutex;

use cafrt_core::{Config, ImageId, ImageStatus};
use cafrt_team::TeamStack;
use cafrt_window::WindowManager;
use mpi::environment::{Threading, Universe};
use mpi::ffi;
use mpi::raw::{AsRaw, FromRaw};
use mpi::topology::{Communicator, SimpleCommunicator};
use once_cell::sync::OnceCell;

static RUNTIME: OnceCell<Mutex<Runtime>> = OnceCell::new();

pub struct Runtime {
    /// Kept alive for the process lifetime; dropping it calls
    /// `MPI_Finalize` unless the host owned the transport
    /// (`spec.md` §6 "Environment").
    universe: Option<Universe>,
    pub world: SimpleCommunicator,
    pub config: Config,
    pub window: WindowManager,
    pub teams: TeamStack,
    pub channel: cafrt_channel::Channel,
}

impl Runtime {
    pub fn self_image(&self) -> ImageId {
        ImageId::from_rank(self.world.rank())
    }

    /// Current observed status of `image` (`spec.md` §7 tier 2, §6
    /// `image_status`), read from the process-wide image-status window.
    pub fn image_status(&self, image: ImageId) -> ImageStatus {
        self.window.image_status().query(image.as_rank())
    }

    /// Publishes `status` for the calling image to every peer
    /// (`spec.md` §4.B "Failure policy": "flush image status, broadcast it
    /// on the image-status window").
    pub fn publish_status(&self, status: ImageStatus) -> Result<(), cafrt_core::CafError> {
        self.window.image_status().publish(self.world.rank(), status)
    }
}

/// `spec.md` §6 `init`: establishes the global runtime. If `host_comm` is
/// `Some`, the host already called `MPI_Init`/`MPI_Init_thread` and
/// `finalize` must not call `MPI_Finalize` (`spec.md` §6 "Environment").
pub fn init(host_owns_transport: bool) -> Result<(), cafrt_core::CafError> {
    if RUNTIME.get().is_some() {
        return Err(cafrt_core::CafError::Fatal("init called twice".into()));
    }

    let config = Config::from_env(host_owns_transport);

    // The communication thread (component F) issues MPI calls concurrently
    // with the main thread's RMA traffic, so the transport needs
    // MPI_THREAD_MULTIPLE (`spec.md` §5 "Scheduling model").
    let universe = if host_owns_transport {
        None
    } else {
        let (universe, threading) = mpi::initialize_with_threading(Threading::Multiple)
            .ok_or_else(|| cafrt_core::CafError::Fatal("MPI_Init_thread failed".into()))?;
        if threading != Threading::Multiple {
            log::error!(
                "cafrt: MPI implementation only provided {:?}, communication thread may not be safe",
                threading
            );
        }
        Some(universe)
    };

    let world = match &universe {
        Some(u) => u.world(),
        // The host already called MPI_Init; wrap MPI_COMM_WORLD directly
        // rather than re-initializing (`spec.md` §6 "Environment").
        None => unsafe { SimpleCommunicator::from_raw(ffi::RSMPI_COMM_WORLD) },
    };

    let self_rank = world.rank();
    let window = WindowManager::new(&world)?;
    let teams = TeamStack::new(world.clone());
    let channel = cafrt_channel::Channel::new(world.as_raw(), ImageId::from_rank(self_rank))?;

    let runtime = Runtime {
        universe,
        world,
        config,
        window,
        teams,
        channel,
    };

    RUNTIME
        .set(Mutex::new(runtime))
        .map_err(|_| cafrt_core::CafError::Fatal("init raced with itself".into()))
}

/// `spec.md` §6 `finalize`: flushes pending state and tears the runtime
/// down. Does not call `MPI_Finalize` when the host owns the transport.
pub fn finalize() -> Result<(), cafrt_core::CafError> {
    let mutex = RUNTIME
        .get()
        .ok_or_else(|| cafrt_core::CafError::Fatal("finalize called before init".into()))?;
    let mut guard = mutex.lock().expect("runtime mutex poisoned");
    guard.window.sync_memory()?;
    guard.publish_status(ImageStatus::Stopped)?;
    guard.channel.shutdown()?;
    // `universe`'s Drop calls MPI_Finalize; when the host owns the
    // transport it was never populated, so nothing happens here.
    Ok(())
}

/// Every fatal-tier error flows through here (`spec.md` §7 tier 3, §9
/// "Exceptions / aborts"): log a diagnostic, best-effort notify peers via
/// the image-status path, and exit. Never called from the communication
/// thread; only the main thread performs process-ending diagnostics.
pub fn terminate_internal(message: &str) -> ! {
    log::error!("cafrt: fatal error, aborting: {message}");
    if let Some(mutex) = RUNTIME.get() {
        if let Ok(mut guard) = mutex.lock() {
            let _ = guard.publish_status(ImageStatus::Failed);
            let _ = guard.window.sync_memory();
        }
    }
    std::process::exit(1)
}

pub fn with_runtime<T>(f: impl FnOnce(&Runtime) -> Result<T, cafrt_core::CafError>) -> Result<T, cafrt_core::CafError> {
    let mutex = RUNTIME
        .get()
        .ok_or_else(|| cafrt_core::CafError::Fatal("runtime not initialized".into()))?;
    let guard = mutex.lock().expect("runtime mutex poisoned");
    f(&guard)
}

pub fn with_runtime_mut<T>(f: impl FnOnce(&mut Runtime) -> Result<T, cafrt_core::CafError>) -> Result<T, cafrt_core::CafError> {
    let mutex = RUNTIME
        .get()
        .ok_or_else(|| cafrt_core::CafError::Fatal("runtime not initialized".into()))?;
    let mut guard = mutex.lock().expect("runtime mutex poisoned");
    f(&mut guard)
}
