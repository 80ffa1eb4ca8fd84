//! Tracing subscriber setup for embedding services.

use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the JSON tracing subscriber, filtered by `RUST_LOG`.
///
/// Safe to call more than once: a second initialisation is reported and
/// ignored rather than panicking.
pub fn init() {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }
}
