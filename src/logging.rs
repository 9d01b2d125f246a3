//! Structured logging initialization
//!
//! Sets up the global tracing subscriber from [`LoggingConfig`]: env-filter
//! driven levels (`RUST_LOG` wins over the configured default) and either
//! plain or JSON output.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize the global tracing subscriber.
///
/// Safe to call once at startup; a second call is ignored so tests that
/// race on initialization do not panic.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    let result = match config.format {
        LogFormat::Json => fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .try_init(),
        LogFormat::Plain => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    // Already initialized (e.g. by a test harness)
    let _ = result;
}

/// Mask an address for log output, keeping enough of both ends to eyeball.
pub fn mask_address(address: &str) -> String {
    if address.len() <= 10 {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}
