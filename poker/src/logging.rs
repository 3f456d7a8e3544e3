//! Tracing setup shared by the `poker` and `poker-server` binaries.
//!
//! Everything the engine narrates (passes, lifecycle steps, composed
//! dry-run invocations) goes through `tracing`; there is no separate product log.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `poker=info,poker_server=info` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=poker=debug poker daemon
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("poker=info,poker_server=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
