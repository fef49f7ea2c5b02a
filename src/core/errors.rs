use axum::extract::rejection::JsonRejection;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

use crate::chat::{ConversationError, EngineError, TurnError};
use crate::flags::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("answer engine failed: {0}")]
    BadGateway(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ConversationError> for ApiError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::InvalidRating(_) => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Conflict(err.to_string()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::BadGateway(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<TurnError> for ApiError {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::EmptyQuestion => ApiError::BadRequest(err.to_string()),
            TurnError::Engine(inner) => inner.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_errors_map_to_client_and_gateway_statuses() {
        let empty: ApiError = TurnError::EmptyQuestion.into();
        assert_eq!(empty.into_response().status(), StatusCode::BAD_REQUEST);

        let engine: ApiError = TurnError::Engine(EngineError::Backend("timeout".into())).into();
        assert_eq!(engine.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn invariant_violations_are_conflicts() {
        let err: ApiError = ConversationError::AlreadyRated { index: 2 }.into();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);

        let err: ApiError = ConversationError::InvalidRating(7).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
