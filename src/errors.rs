use crate::services::{ServiceError, pagination::CursorError};
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Error returned by every handler. Renders as `{"error": "<code>"}`.
///
/// `code` is the stable machine-readable string clients match on; the cause
/// of server-side failures is logged, never sent.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str) -> Self {
        Self { status, code }
    }

    pub fn bad_request(code: &'static str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code)
    }

    /// Shortcut for 500 Internal Server Error
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_server_error")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.code)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.code }))).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(code) => AppError::bad_request(code),
            ServiceError::InvalidCursor(cause) => {
                tracing::debug!(error = %cause, "rejected cursor");
                AppError::bad_request("bad_cursor")
            }
            ServiceError::NotFound(code) => AppError::new(StatusCode::NOT_FOUND, code),
            ServiceError::PhotoNotFound => AppError::bad_request("photo_not_found"),
            ServiceError::CoverNotInAlbum => AppError::bad_request("cover_not_in_album"),
            ServiceError::Conflict(code) => AppError::new(StatusCode::CONFLICT, code),
            ServiceError::Storage(cause) => {
                tracing::error!(error = %cause, "database failure");
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "storage_failure")
            }
            ServiceError::Upstream(cause) => {
                tracing::error!(error = %cause, "object store failure");
                AppError::new(StatusCode::BAD_GATEWAY, "upstream_failure")
            }
        }
    }
}

impl From<CursorError> for AppError {
    fn from(err: CursorError) -> Self {
        ServiceError::from(err).into()
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected path");
        AppError::bad_request("bad_path")
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected query string");
        AppError::bad_request("bad_request")
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected request body");
        AppError::bad_request("bad_request")
    }
}
