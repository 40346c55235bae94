// crates/repweight-cli/src/logging.rs
// ============================================================================
// Module: CLI Logging
// Description: Process-wide tracing subscriber setup.
// Purpose: Route store, migration, and bootstrap events to stderr.
// Dependencies: repweight-config, tracing-subscriber
// ============================================================================

//! ## Overview
//! Installs one `fmt` subscriber for the process. `RUST_LOG` wins over the
//! configured level. Output goes to stderr so stdout stays machine-readable.

use repweight_config::LoggingConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns a message when the filter is malformed or a subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|err| format!("invalid log filter {}: {err}", config.level))?;
    let layer =
        tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_ansi(config.ansi);
    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|err| format!("failed to install log subscriber: {err}"))
}
