//! Serving error type with HTTP status code mapping.
//!
//! [`ApiError`] is what every handler returns on failure. Each variant maps
//! to a specific HTTP status code and a structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::inference::PredictionError;
use crate::persistence::PersistenceError;
use crate::service::{InferenceError, RefreshError};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "predictions not ready"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Handler error with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category    | HTTP Status               |
/// |-----------|-------------|---------------------------|
/// | 1000–1999 | Validation  | 400 Bad Request           |
/// | 2000–2999 | Readiness   | 503 Service Unavailable   |
/// | 3000–3999 | Server      | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Predictions were requested but none are stored yet.
    #[error("predictions not ready")]
    PredictionsUnavailable,

    /// A read from the store failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// A manual collection cycle failed.
    #[error("refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    /// A manual inference run failed.
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),

    /// The prediction service could not be queried.
    #[error("prediction service error: {0}")]
    PredictionService(#[from] PredictionError),
}

impl ApiError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::PredictionsUnavailable => 2001,
            Self::Persistence(_) => 3001,
            Self::Refresh(_) => 3002,
            Self::Inference(_) => 3003,
            Self::PredictionService(_) => 3004,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::PredictionsUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Persistence(_)
            | Self::Refresh(_)
            | Self::Inference(_)
            | Self::PredictionService(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
