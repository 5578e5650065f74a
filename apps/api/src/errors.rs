use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::chat::ChatError;
use crate::profile::quick_actions::QuickActionError;
use crate::transcript::TranscriptError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Unavailable(msg) => AppError::Unavailable(msg),
            ChatError::Transcript(TranscriptError::ReplyInProgress) => {
                AppError::Conflict(TranscriptError::ReplyInProgress.to_string())
            }
            ChatError::Transcript(e @ TranscriptError::EmptyMessage) => {
                AppError::Validation(e.to_string())
            }
            ChatError::Transcript(e @ TranscriptError::NoReplyInProgress) => {
                AppError::Internal(anyhow::anyhow!(e))
            }
        }
    }
}

impl From<QuickActionError> for AppError {
    fn from(err: QuickActionError) -> Self {
        match err {
            QuickActionError::Unknown(_) => AppError::NotFound(err.to_string()),
            QuickActionError::MissingRole => AppError::Validation(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "REPLY_IN_PROGRESS", msg.clone()),
            AppError::Unavailable(msg) => {
                tracing::warn!("Chat unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "CHAT_UNAVAILABLE",
                    msg.clone(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
