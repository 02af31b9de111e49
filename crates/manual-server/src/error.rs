//! Mapping from library errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use manual_core::{ApiConfig, ManualError};
use serde_json::json;
use tracing::error;

/// Error returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    /// 422 with `{errors: [...]}`.
    Unprocessable(Vec<String>),
    NotFound(String),
    BadRequest(String),
    /// Rejection raised by an axum extractor, with the status it chose.
    Rejected { status: StatusCode, message: String },
    Internal(ManualError),
}

impl ApiError {
    pub fn manual_not_found() -> Self {
        ApiError::NotFound(ApiConfig::MANUAL_NOT_FOUND.to_string())
    }
}

impl From<ManualError> for ApiError {
    fn from(err: ManualError) -> Self {
        match err {
            ManualError::Validation(messages) => ApiError::Unprocessable(messages),
            ManualError::ManualNotFound { .. } => ApiError::manual_not_found(),
            ManualError::AttachmentNotFound { .. } => {
                ApiError::NotFound(ApiConfig::ATTACHMENT_NOT_FOUND.to_string())
            }
            ManualError::InvalidPayload { message } => ApiError::BadRequest(message),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unprocessable(messages) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!({ "errors": messages }))
            }
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            ApiError::Rejected { status, message } => (status, json!({ "error": message })),
            ApiError::Internal(err) => {
                error!("Request failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
