//! Diagnostic tracing for toolgate.
//!
//! Controlled by `RUST_LOG` and written to stderr, so stdout carries only tool
//! output (and, under `toolgate serve`, only protocol lines).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn` if unset. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=toolgate=debug toolgate search TODO
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
