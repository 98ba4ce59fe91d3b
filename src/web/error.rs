use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::twitch::TwitchError;
use crate::webhooks::service::OrchestrationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Upstream failure: {0}")]
    Upstream(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({ "error": error_message }))).into_response()
    }
}

impl From<OrchestrationError> for AppError {
    fn from(err: OrchestrationError) -> Self {
        match err {
            OrchestrationError::AccountNotFound(login) => {
                AppError::NotFound(format!("twitch account '{login}' not found"))
            }
            OrchestrationError::InvalidResponse(msg) => AppError::Upstream(msg),
            OrchestrationError::Twitch(TwitchError::NoCredential(id)) => AppError::InvalidInput(
                format!("account {id} has not authorized this application"),
            ),
            OrchestrationError::Twitch(e) => AppError::Upstream(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}
