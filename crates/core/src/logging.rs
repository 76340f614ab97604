//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "debug,engine_rhi=debug,engine_renderer=debug,winit=warn"
    } else {
        "info,winit=warn"
    }
}

/// Initialize the logging system with tracing.
///
/// `RUST_LOG` takes precedence; otherwise the level follows `debug`.
/// Calling this twice is harmless: the second subscriber is not installed.
///
/// # Example
/// ```
/// engine_core::init_logging(false);
/// tracing::info!("Engine initialized");
/// ```
pub fn init_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
