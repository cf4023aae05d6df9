use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::enrollment::session::StorageError;
use crate::workflows::enrollment::verify::SessionError;
use crate::workflows::enrollment::wizard::WizardError;

/// Failures surfaced while bootstrapping or running the service.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Enrollment(SessionError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(error) => write!(f, "configuration error: {error}"),
            AppError::Telemetry(error) => write!(f, "telemetry error: {error}"),
            AppError::Io(error) => write!(f, "io error: {error}"),
            AppError::Enrollment(error) => write!(f, "enrollment error: {error}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(error) => Some(error),
            AppError::Telemetry(error) => Some(error),
            AppError::Io(error) => Some(error),
            AppError::Enrollment(error) => Some(error),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        AppError::Config(error)
    }
}

impl From<TelemetryError> for AppError {
    fn from(error: TelemetryError) -> Self {
        AppError::Telemetry(error)
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        AppError::Io(error)
    }
}

impl From<SessionError> for AppError {
    fn from(error: SessionError) -> Self {
        AppError::Enrollment(error)
    }
}

impl From<WizardError> for AppError {
    fn from(error: WizardError) -> Self {
        AppError::Enrollment(SessionError::Wizard(error))
    }
}

impl From<StorageError> for AppError {
    fn from(error: StorageError) -> Self {
        AppError::Enrollment(SessionError::Wizard(WizardError::Storage(error)))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Enrollment(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_) | AppError::Telemetry(_) | AppError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
