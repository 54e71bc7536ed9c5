//! Tracing setup helpers.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber with the given filter directive
/// (e.g. `"conclave=debug"`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}
