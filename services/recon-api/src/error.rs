//! Error types for the Reconciliation API service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use paylane_recon::ReconError;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// API error type
///
/// Providers retry on any non-2xx response, so the mapping is strict:
/// only authentication and parse failures get client-error codes, and
/// anything already-handled never reaches here (it is a 200 at the
/// handler).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Recon(#[from] ReconError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Recon(ReconError::AuthFailure) => StatusCode::UNAUTHORIZED,
            Self::Recon(ReconError::MalformedPayload(_)) => StatusCode::BAD_REQUEST,
            Self::Recon(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Recon(ReconError::AuthFailure) => "AUTH_FAILURE",
            Self::Recon(ReconError::MalformedPayload(_)) => "MALFORMED_PAYLOAD",
            Self::Recon(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(error = ?self, "Internal API error");
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
