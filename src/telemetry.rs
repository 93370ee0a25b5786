//! Tracing subscriber setup for binaries and tests.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber reading `RUST_LOG`, defaulting to
/// `info`.
///
/// Safe to call more than once; only the first installation wins (handy in
/// tests, where multiple cases may race to initialize).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
