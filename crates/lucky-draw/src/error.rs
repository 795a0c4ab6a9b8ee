use crate::config::ConfigError;
use crate::draws::LuckyDrawError;
use crate::telemetry::TelemetryError;
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
    Draw(LuckyDrawError),
    /// Failure wiring collaborators before the server starts.
    Startup(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Draw(err) => write!(f, "lucky draw error: {}", err),
            AppError::Startup(err) => write!(f, "startup error: {}", err),
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
            AppError::Draw(err) => Some(err),
            AppError::Startup(err) => Some(err.as_ref()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Draw(err) => crate::draws::router::error_response(err),
            other => {
                tracing::error!(error = %other, "request failed");
                let body = Json(json!({ "error": "internal server error", "code": "internal" }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
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

impl From<LuckyDrawError> for AppError {
    fn from(value: LuckyDrawError) -> Self {
        Self::Draw(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draws::Missing;

    #[test]
    fn draw_errors_keep_their_status() {
        let response = AppError::from(LuckyDrawError::NotFound(Missing::Draw)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn infrastructure_errors_are_opaque() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let response = AppError::from(io).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn startup_errors_name_their_stage() {
        let err = AppError::Startup("seed store offline".into());
        assert_eq!(err.to_string(), "startup error: seed store offline");
        assert!(std::error::Error::source(&err).is_some());
    }
}
