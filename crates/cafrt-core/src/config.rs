use std::env;
use std::time::Duration;

/// Process-lifetime configuration, read once in `init` and never re-read
/// afterward (`spec.md` §6 "Environment", §9 "Global mutable state").
#[derive(Clone, Debug)]
pub struct Config {
    /// Prepended to every accessor hash namespace so that two runtime
    /// instances linked into the same address space (rare, but the ABI
    /// allows for it via `PREFIX_NAME`) don't collide. This approximates
    /// the original's link-time symbol prefixing; see DESIGN.md.
    pub prefix_name: String,
    /// Whether `init` was handed an already-initialized MPI transport by
    /// the host program; if so `finalize` must not call `MPI_Finalize`.
    pub host_owns_transport: bool,
    /// Enables the failed-image background receive and error handler
    /// described in `spec.md` §5/§7.
    pub failed_images: bool,
    /// Back-off between spin attempts in `lock`/`event_wait` (`spec.md` §4.G).
    pub spin_backoff: Duration,
}

impl Config {
    pub fn from_env(host_owns_transport: bool) -> Self {
        let prefix_name = env::var("PREFIX_NAME").unwrap_or_default();
        let failed_images = env::var("CAFRT_FAILED_IMAGES")
            .map(|v| v != "0")
            .unwrap_or(false);
        let spin_backoff_us: u64 = env::var("CAFRT_SPIN_BACKOFF_US")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(50);
        Config {
            prefix_name,
            host_owns_transport,
            failed_images,
            spin_backoff: Duration::from_micros(spin_backoff_us),
        }
    }

    /// The entry point name a caller configured with `PREFIX_NAME` should
    /// be dispatched under, e.g. `"myprefix_caf_get"` for the `get` entry
    /// point when `PREFIX_NAME=myprefix_`.
    pub fn entry_point_name(&self, bare: &str) -> String {
        format!("{}{}", self.prefix_name, bare)
    }
}
