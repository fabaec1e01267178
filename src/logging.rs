//! Tracing subscriber setup
//!
//! Host applications call [`init_tracing`] once at startup. `RUST_LOG` takes
//! precedence over the configured level when it is set.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, thiserror::Error)]
#[error("failed to initialize logging: {0}")]
pub struct LoggingInitError(String);

/// Install the global subscriber described by `config`.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| LoggingInitError(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Plain => registry
            .with(fmt::layer().with_target(false).with_line_number(true))
            .try_init(),
    };

    result.map_err(|e| LoggingInitError(e.to_string()))
}
