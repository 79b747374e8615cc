#![allow(clippy::unwrap_used, clippy::expect_used)]

pub mod workflow;

use tracing_subscriber::fmt::format::FmtSpan;

/// Installs a test-writer subscriber once per test binary; later calls are
/// no-ops.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_test_writer()
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE)
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
