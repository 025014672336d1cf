//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::session::SessionError;

/// Errors returned by request handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // 401 Unauthorized
    #[error("Authentication required")]
    Unauthorized,

    // 503 Service Unavailable
    #[error("The room is closed")]
    RoomClosed,
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        tracing::debug!(error = %e, "Rejected session cookie");
        AppError::Unauthorized
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::RoomClosed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
