//! HTTP request handlers

use super::types::{ActivitiesResponse, ErrorResponse, HealthResponse};
use super::AppState;
use crate::activity::Activity;
use crate::dialog::TransitionError;
use crate::runtime::TurnError;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Activity ingress from the channel
        .route("/api/messages", post(receive_activity))
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Activity Ingress
// ============================================================

async fn receive_activity(
    State(state): State<AppState>,
    payload: Result<Json<Activity>, JsonRejection>,
) -> Result<Json<ActivitiesResponse>, AppError> {
    let Json(activity) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let activities = state.runner.handle(&activity).await.map_err(|e| {
        tracing::error!(
            conv_id = %activity.conversation.id,
            activity_type = %activity.activity_type,
            error = %e,
            "Turn failed"
        );
        AppError::from(e)
    })?;

    Ok(Json(ActivitiesResponse { activities }))
}

// ============================================================
// Health / Version
// ============================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

async fn get_version() -> &'static str {
    concat!("qna-bot ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    Conflict(String),
    BadGateway(String),
    Internal(String),
}

impl From<TurnError> for AppError {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::BadActivity(_) => AppError::BadRequest(err.to_string()),
            TurnError::Transition(TransitionError::TurnInProgress) => {
                AppError::Conflict(err.to_string())
            }
            TurnError::Qna(_) => AppError::BadGateway(err.to_string()),
            TurnError::Transition(_)
            | TurnError::Auth(_)
            | TurnError::Storage(_)
            | TurnError::Unsettled(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
