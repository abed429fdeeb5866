//! Tracing initialization.
//!
//! Structured logging only; exporters (metrics, distributed tracing) are
//! deployment concerns layered on top via additional subscriber layers.

use tracing_subscriber::EnvFilter;

/// Environment variable controlling the log filter.
pub const LOG_FILTER_ENV: &str = "LB_LOG";

/// Initializes the global tracing subscriber.
///
/// The filter comes from `LB_LOG` when set, falling back to
/// `default_filter` (e.g. `"info"` or `"engine_runtime=debug,info"`).
/// Safe to call more than once; later calls are no-ops.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
