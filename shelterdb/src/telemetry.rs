//! Logging setup.

use tracing_subscriber::{EnvFilter, fmt, prelude::*, util::TryInitError};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` is used as the filter directive. Call once at
/// startup. A second call fails because a global subscriber is already installed.
pub fn init(level: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
}
