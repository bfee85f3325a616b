//! Control API handlers.

use crate::runner::{Command, RunControl, RunStatus};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub control: Arc<RunControl>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Latest population statistics
pub async fn get_stats(State(state): State<AppState>) -> Json<RunStatus> {
    Json(state.control.status())
}

#[derive(Serialize)]
pub struct AcceptedResponse {
    accepted: bool,
}

/// Ask the run to stop at the next update boundary
pub async fn request_exit(State(state): State<AppState>) -> Result<Json<AcceptedResponse>, ApiError> {
    if state.control.is_finished() {
        return Err(ApiError::Conflict("run already finished".to_string()));
    }
    info!("Exit requested over API");
    state.control.submit(Command::Exit);
    Ok(Json(AcceptedResponse { accepted: true }))
}

#[derive(Deserialize)]
pub struct CommentRequest {
    text: String,
}

/// Attach a comment to the run log
pub async fn post_comment(
    State(state): State<AppState>,
    Json(req): Json<CommentRequest>,
) -> Result<Json<AcceptedResponse>, ApiError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("comment text is empty".to_string()));
    }
    state.control.submit(Command::Comment(text.to_string()));
    Ok(Json(AcceptedResponse { accepted: true }))
}

// Error handling
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Conflict(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        (status, message).into_response()
    }
}
