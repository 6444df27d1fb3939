use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::KeyError;
use crate::services::ChatError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Completion failed: {0}")]
    CompletionFailed(String),

    #[error("Completion timed out after {0:?}")]
    CompletionTimeout(Duration),

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Store(StoreError::Unavailable(msg)) => ApiError::StoreUnavailable(msg),
            ChatError::Store(e @ StoreError::SystemMessage) => ApiError::BadRequest(e.to_string()),
            ChatError::Store(e @ StoreError::Encode(_)) => ApiError::InternalError(e.to_string()),
            ChatError::Completion(e) => ApiError::CompletionFailed(e.to_string()),
            ChatError::CompletionTimeout(d) => ApiError::CompletionTimeout(d),
            ChatError::Window(e) => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<KeyError> for ApiError {
    fn from(err: KeyError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "BadRequest", msg)
            }
            ApiError::StoreUnavailable(msg) => {
                tracing::error!("Session store unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "StoreUnavailable", msg)
            }
            ApiError::CompletionFailed(msg) => {
                tracing::error!("Completion failed: {}", msg);
                (StatusCode::BAD_GATEWAY, "CompletionFailed", msg)
            }
            ApiError::CompletionTimeout(timeout) => {
                tracing::error!("Completion timed out after {:?}", timeout);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "CompletionTimeout",
                    format!("Completion timed out after {timeout:?}"),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
