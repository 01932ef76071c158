//! Telemetry logic.
//! Structured logging through `tracing`.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// The configured directive is the default filter; `RUST_LOG` takes
/// precedence when set.
pub fn init(directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
