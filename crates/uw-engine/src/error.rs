use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::logs::{LogBookError, LogStoreError};
use crate::telemetry::TelemetryError;
use crate::underwriting::OutcomeOrderError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Catalog(CatalogError),
    Logs(LogBookError),
    OutcomeOrder(OutcomeOrderError),
    Json(serde_json::Error),
    Csv(csv::Error),
    NotFound(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Catalog(err) => write!(f, "catalog error: {}", err),
            AppError::Logs(err) => write!(f, "outcome log error: {}", err),
            AppError::OutcomeOrder(err) => write!(f, "invalid outcome order: {}", err),
            AppError::Json(err) => write!(f, "json error: {}", err),
            AppError::Csv(err) => write!(f, "csv error: {}", err),
            AppError::NotFound(what) => write!(f, "{} not found", what),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Catalog(err) => Some(err),
            AppError::Logs(err) => Some(err),
            AppError::OutcomeOrder(err) => Some(err),
            AppError::Json(err) => Some(err),
            AppError::Csv(err) => Some(err),
            AppError::NotFound(_) => None,
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Catalog(CatalogError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Catalog(_) => StatusCode::BAD_REQUEST,
            AppError::Logs(LogBookError::InvalidLogs) | AppError::OutcomeOrder(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Logs(_)
            | AppError::Csv(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<CatalogError> for AppError {
    fn from(value: CatalogError) -> Self {
        Self::Catalog(value)
    }
}

impl From<LogBookError> for AppError {
    fn from(value: LogBookError) -> Self {
        Self::Logs(value)
    }
}

impl From<LogStoreError> for AppError {
    fn from(value: LogStoreError) -> Self {
        Self::Logs(LogBookError::Store(value))
    }
}

impl From<OutcomeOrderError> for AppError {
    fn from(value: OutcomeOrderError) -> Self {
        Self::OutcomeOrder(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<csv::Error> for AppError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_map_to_client_statuses() {
        assert_eq!(
            AppError::from(OutcomeOrderError::Empty).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(LogBookError::InvalidLogs).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(CatalogError::DuplicateId("x".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("carrier 'x'".to_string()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(std::io::Error::other("disk")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn messages_name_the_failing_layer() {
        let err = AppError::NotFound("carrier 'carrier-z'".to_string());
        assert_eq!(err.to_string(), "carrier 'carrier-z' not found");

        let err = AppError::from(OutcomeOrderError::Empty);
        assert!(err.to_string().starts_with("invalid outcome order:"));
    }
}
