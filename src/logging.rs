//! `tracing` subscriber setup for the job binary.

use tracing_subscriber::{EnvFilter, Layer, Registry};
use tracing_subscriber::prelude::*;

/// Install a stdout subscriber.
///
/// The filter comes from `RUST_LOG` (default `info`). Setting
/// `RUST_LOG_FORMAT=json` switches to one JSON object per event. Calling this
/// twice is harmless; the second call keeps the first subscriber.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_fmt = std::env::var("RUST_LOG_FORMAT")
        .map(|val| val == "json")
        .unwrap_or(false);

    let layer: Box<dyn Layer<Registry> + Send + Sync> = if json_fmt {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .json()
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).boxed()
    };

    let _ = tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init();
}
