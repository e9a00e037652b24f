//! Error taxonomy shared by the store, service, and HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Malformed or out-of-bounds input.
    #[error("{0}")]
    Validation(String),

    /// No resolvable caller identity.
    #[error("{0}")]
    Unauthorized(String),

    /// Unknown conversation/room, or the requester is not a member.
    #[error("{0}")]
    NotFound(String),

    /// Reserved for races the store surfaces instead of resolving.
    /// DM get-or-create resolves transparently and never produces this.
    #[error("{0}")]
    Conflict(String),

    /// Storage or serialization failure.
    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ChatError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ChatError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ChatError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ChatError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ChatError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": {
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Internal(err.to_string())
    }
}
