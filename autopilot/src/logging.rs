//! Diagnostic tracing for the supervisor.
//!
//! Tracing goes to stderr and is controlled by `RUST_LOG`. User-facing status
//! lines are printed by the CLI on stdout and are not affected by the filter.
//! Worker transcripts under `.autopilot/transcripts/` are written regardless.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "autopilot=info,warn";

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to `info` for this crate and `warn` elsewhere.
///
/// # Example
/// ```bash
/// RUST_LOG=autopilot=debug autopilot "Build a login page"
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
