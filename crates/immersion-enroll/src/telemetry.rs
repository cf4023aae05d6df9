use std::fmt;

use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

#[derive(Debug)]
pub enum TelemetryError {
    SubscriberInit(String),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::SubscriberInit(message) => {
                write!(f, "failed to initialize tracing subscriber: {message}")
            }
        }
    }
}

impl std::error::Error for TelemetryError {}

/// Installs the global tracing subscriber. Falls back to `info` when the
/// configured level does not parse as an `EnvFilter` directive.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .try_init()
        .map_err(|error| TelemetryError::SubscriberInit(error.to_string()))
}
