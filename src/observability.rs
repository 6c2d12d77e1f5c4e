//! Subscriber setup for the command-line tool.
//!
//! Library code only emits `tracing` events under `wdm::cache*` targets;
//! installing a subscriber is left to binaries.

use tracing::Level;

/// Installs a stderr `fmt` subscriber at `INFO` when `enabled` is `true`.
///
/// A subscriber that is already installed is left in place.
pub(crate) fn init_logging(enabled: bool) {
    if !enabled {
        return;
    }
    let installed = tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
