// ============================================================================
// Tracing Subscriber Setup
// ============================================================================

use tracing_subscriber::{fmt, EnvFilter};

/// Install a global `fmt` subscriber.
///
/// The filter is read from `RUST_LOG` and defaults to `info`, e.g.
/// `RUST_LOG=campaign_finance_engine=debug` to see per-batch progress.
///
/// # Example
/// ```no_run
/// campaign_finance_engine::utils::init_tracing();
/// ```
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // a subscriber may already be installed by the host application
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .try_init();
}

/// Verbose subscriber writing through the test harness
pub fn init_test_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
