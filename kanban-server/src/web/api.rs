use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinError;

use crate::json::{self, ParseError};
use crate::persistence::PersistenceError;
use crate::web::AppState;
use crate::web::edit::{EditRequest, ValidationError};
use crate::web::middleware::CorsHeadersLayer;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Largest `/edit` body accepted; whole boards are posted at once.
pub const EDIT_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Acknowledgement body of `/edit` and of every API failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn success() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(reason.into()),
        }
    }
}

/// Failure of a JSON API request, answered as `{"ok":false,"error":"<reason>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request body could not be read: {0}")]
    Body(#[from] BytesRejection),
    #[error("request body is not valid UTF-8")]
    BodyNotUtf8,
    #[error("request body is not valid JSON: {0}")]
    Parse(#[from] ParseError),
    #[error("edit payload rejected: {0}")]
    Invalid(#[from] ValidationError),
    #[error("board updated but not saved: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("blocking task did not complete: {0}")]
    Internal(#[from] JoinError),
    #[error("method not allowed")]
    MethodNotAllowed,
}

impl ApiError {
    pub fn reason(&self) -> &'static str {
        match self {
            ApiError::Body(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                "body_too_large"
            }
            ApiError::Body(_) => "body_unreadable",
            ApiError::BodyNotUtf8 => "body_not_utf8",
            ApiError::Parse(err) => err.reason(),
            ApiError::Invalid(err) => err.reason(),
            ApiError::Persistence(_) => "persistence_failed",
            ApiError::Internal(_) => "internal_error",
            ApiError::MethodNotAllowed => "method_not_allowed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Body(rejection) => rejection.status(),
            ApiError::BodyNotUtf8 | ApiError::Parse(_) | ApiError::Invalid(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Persistence(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("API request failed: {}", self);
        } else {
            tracing::warn!("API request rejected: {}", self);
        }
        (status, Json(ApiResponse::failure(self.reason()))).into_response()
    }
}

/// Handler for GET /state - returns every board as `{"boards":[...]}`.
#[tracing::instrument(skip(state))]
pub async fn get_state_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let store = state.store.clone();
    let document = tokio::task::spawn_blocking(move || store.export_all()).await?;
    Ok(([(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], document).into_response())
}

/// Handler for POST /edit - replaces one board with the posted task list.
///
/// The payload is decoded and validated in full before the store is touched.
#[tracing::instrument(skip(state, body))]
pub async fn edit_handler(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ApiResponse>, ApiError> {
    let body = body?;
    tracing::debug!(body_len = body.len(), "Received edit payload");
    let text = std::str::from_utf8(&body).map_err(|_| ApiError::BodyNotUtf8)?;
    let request = EditRequest::from_json(&json::parse(text)?)?;

    tracing::info!(
        board = %request.board_key,
        tasks = request.tasks.len(),
        reason = request.reason.as_deref().unwrap_or("-"),
        updated_at = request.updated_at.as_deref().unwrap_or("-"),
        "Replacing board"
    );

    let store = state.store.clone();
    tokio::task::spawn_blocking(move || {
        store.replace_board(&request.board_key, &request.board_name, request.tasks)
    })
    .await??;

    Ok(Json(ApiResponse::success()))
}

/// CORS preflight; the headers come from [`CorsHeadersLayer`].
pub async fn preflight_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn method_not_allowed_handler() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Creates the `/state` and `/edit` routes.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/state",
            get(get_state_handler)
                .head(method_not_allowed_handler)
                .options(preflight_handler)
                .fallback(method_not_allowed_handler),
        )
        .route(
            "/edit",
            post(edit_handler)
                .options(preflight_handler)
                .fallback(method_not_allowed_handler),
        )
        .layer(DefaultBodyLimit::max(EDIT_BODY_LIMIT))
        .layer(CorsHeadersLayer::new())
        .with_state(state)
}
