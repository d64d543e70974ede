//! Tracing setup for the scheduling core.
//!
//! The SDK embedding this crate installs its own subscriber; tests and
//! stand-alone binaries call [`init_tracing`] to see worker lifecycle,
//! reroute, and cancel-budget logs on stderr.

use tracing_subscriber::EnvFilter;

/// Install a default stderr subscriber unless one is already set.
///
/// The filter comes from `RUST_LOG`, falling back to `rtc_workers=info` so
/// worker start/stop and cancel warnings are visible out of the box while
/// per-task debug lines stay quiet. Safe to call from every test; only the
/// first call installs anything.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rtc_workers=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
