//! Tracing bootstrap for tests.

use tracing_subscriber::EnvFilter;

/// Install a `RUST_LOG`-filtered subscriber that writes through the test
/// harness. Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
