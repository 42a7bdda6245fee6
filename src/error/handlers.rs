//! Error handlers
//!
//! Converts storage errors into HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{debug, error, warn};

use crate::api::responses::ErrorResponse;
use crate::error::types::StorageError;

/// Convert error to HTTP status code
pub fn error_to_status_code(err: &StorageError) -> StatusCode {
    match err {
        StorageError::InvalidFile(_) => StatusCode::BAD_REQUEST,
        StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        StorageError::StorageFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Log an error at a level matching its severity
pub fn handle_error(err: &StorageError) {
    match err {
        StorageError::StorageFailure { .. } => error!("Storage failure: {}", err),
        StorageError::InvalidFile(_) => warn!("Rejected upload: {}", err),
        StorageError::NotFound(_) => debug!("{}", err),
    }
}

impl IntoResponse for StorageError {
    fn into_response(self) -> Response {
        handle_error(&self);

        let status = error_to_status_code(&self);
        let body = ErrorResponse {
            error: self.user_message(),
        };

        (status, Json(body)).into_response()
    }
}
