//! Logging setup.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_LEVEL: &str = "info";

/// Install the global subscriber. `RUST_LOG` overrides the default `info` level.
///
/// Log lines go to stderr so stdout stays reserved for reports.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    if json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init();
    }
}
