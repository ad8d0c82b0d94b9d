//! API error types and responses.
//!
//! Every error renders as `{"error": "<message>"}`.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{BoxError, Json};
use serde::Serialize;
use thiserror::Error;

use fleet_ship_client::FleetError;
use fleet_ship_control::ControlError;

/// `WWW-Authenticate` challenge sent with 401 responses.
pub const AUTH_CHALLENGE: &str = "Basic realm=\"fleet-ship\"";

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// The requested resource was not found.
    #[error("{0}")]
    NotFound(String),

    /// The request did not finish within the request timeout.
    #[error("request timed out")]
    Timeout,

    /// Internal or upstream failure.
    #[error("{0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, Self::Unauthorized) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(AUTH_CHALLENGE),
            );
        }
        response
    }
}

/// Render failures raised by the router's middleware stack.
pub async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("Request timed out");
        ApiError::Timeout
    } else {
        tracing::error!(error = %err, "Middleware error");
        ApiError::Internal(err.to_string())
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err.http_status_code() {
            404 => Self::NotFound(err.to_string()),
            _ => {
                tracing::error!(error = %err, "Control error");
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<FleetError> for ApiError {
    fn from(err: FleetError) -> Self {
        Self::from(ControlError::Fleet(err))
    }
}
