//! HTTP handlers for the token endpoint.

use crate::AppState;
use axum::{
    extract::{Extension, Json, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use folio_types::Credential;
use folio_voice::VoiceError;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Message returned when LiveKit settings are missing.
pub const MISCONFIGURED: &str = "Server misconfigured";

/// Query string of `GET /api/token`.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    /// Optional display name; blank or absent gets a guest identity.
    pub name: Option<String>,
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("too many requests")]
    TooManyRequests,
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

/// Seconds a rate-limited client is told to wait.
const RETRY_AFTER_SECS: &str = "60";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests".to_string(),
            ),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        if status == StatusCode::TOO_MANY_REQUESTS {
            return (status, [(header::RETRY_AFTER, RETRY_AFTER_SECS)], body).into_response();
        }
        (status, body).into_response()
    }
}

impl From<VoiceError> for ApiError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::Config(detail) => {
                tracing::error!(%detail, "token requested but livekit is not configured");
                ApiError::InternalServerError(MISCONFIGURED.to_string())
            }
            VoiceError::InvalidName(reason) => ApiError::BadRequest(reason),
            other => {
                tracing::error!(error = %other, "failed to issue room credential");
                ApiError::InternalServerError("Failed to issue token".to_string())
            }
        }
    }
}

/// Handler for `GET /api/token` and `GET /token`.
pub async fn token_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Credential>, ApiError> {
    let issued = state.token_service.issue(query.name.as_deref())?;
    tracing::debug!(identity = %issued.identity, room = %issued.room, "token handed out");
    Ok(Json(issued.credential))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn config_errors_hide_details() {
        let err = ApiError::from(VoiceError::Config("missing livekit settings: api_secret".into()));
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], MISCONFIGURED);
    }

    #[tokio::test]
    async fn invalid_names_are_bad_requests() {
        let err = ApiError::from(VoiceError::InvalidName("name exceeds 64 characters".into()));
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "name exceeds 64 characters");
    }

    #[tokio::test]
    async fn rate_limited_response_has_error_body() {
        let response = ApiError::TooManyRequests.into_response();
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");

        let (status, json) = body_json(ApiError::TooManyRequests).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json["error"], "Too many requests");
    }

    #[tokio::test]
    async fn other_errors_are_generic() {
        let err = ApiError::from(VoiceError::Transport("signal lost".into()));
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Failed to issue token");
    }
}
