//! Logging initialization.
//!
//! Events go to stderr so command output on stdout stays parseable.
//!
//! The filter comes from `STRATA_LOG` (an [`EnvFilter`] directive string)
//! when set, otherwise from the configured level. `--debug` forces `debug`.

use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

use crate::core::config::schema::LogFormat;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "STRATA_LOG";

/// Build the filter from the environment or the given fallback level.
pub fn filter(fallback_level: &str, debug: bool) -> EnvFilter {
    if debug {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback_level))
}

/// Install the global subscriber.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init(level: &str, format: LogFormat, debug: bool) {
    let filter = filter(level, debug);
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("subscriber already installed");
    }
}
