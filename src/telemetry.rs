//! Tracing initialization.
//!
//! env-filter + compact fmt layer to stderr. RUST_LOG takes precedence
//! over the configured default level.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::error::{Error, Result};

/// Initialize the global tracing subscriber. Call once, from the binary.
pub fn init_telemetry(default_level: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| Error::Other(format!("failed to init tracing subscriber: {e}")))
}
