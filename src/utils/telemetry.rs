//! Tracing subscriber setup.
//!
//! Diagnostics are written to stderr so that stdout carries only the
//! block report. Verbosity follows `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,pnl_stream_monitor=debug";

/// Install the global tracing subscriber.
///
/// Example RUST_LOG values:
/// - `warn` - quiet, only problems
/// - `pnl_stream_monitor=trace` - everything from this crate
pub fn init_telemetry() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_line_number(true)
                .compact(),
        )
        .init();
}
