//! Onboarding flow routes.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AppState;
use crate::error::ApiError;
use crate::flow::{FlowEvent, FlowState};

#[derive(Debug, Serialize)]
struct FlowResponse {
    user_id: String,
    state: FlowState,
}

#[derive(Debug, Deserialize)]
struct EventRequest {
    event: FlowEvent,
}

/// Build the flow routes.
pub fn flow_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/users/{user_id}/flow", get(current))
        .route("/api/users/{user_id}/flow/refresh", post(refresh))
        .route("/api/users/{user_id}/flow/events", post(apply_event))
        .with_state(state)
}

/// Advance optimistically after a successful write, re-deriving when the
/// cached state does not accept the event.
pub(crate) async fn advance_or_refresh(
    state: &AppState,
    user_id: &str,
    event: FlowEvent,
) -> FlowState {
    match state.flow.advance(user_id, event).await {
        Ok(next) => next,
        Err(e) => {
            debug!(user_id = %user_id, error = %e, "Optimistic advance rejected, re-deriving");
            state.flow.refresh(user_id).await
        }
    }
}

/// GET /api/users/{user_id}/flow
async fn current(State(state): State<AppState>, Path(user_id): Path<String>) -> Json<FlowResponse> {
    let flow_state = state.flow.current(&user_id).await;
    Json(FlowResponse {
        user_id,
        state: flow_state,
    })
}

/// POST /api/users/{user_id}/flow/refresh
async fn refresh(State(state): State<AppState>, Path(user_id): Path<String>) -> Json<FlowResponse> {
    let flow_state = state.flow.refresh(&user_id).await;
    Json(FlowResponse {
        user_id,
        state: flow_state,
    })
}

/// POST /api/users/{user_id}/flow/events
///
/// Client-reported step completion. Transitions the current state cannot
/// take are rejected with 409.
async fn apply_event(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<EventRequest>,
) -> Result<Json<FlowResponse>, ApiError> {
    let flow_state = state.flow.advance(&user_id, req.event).await?;
    Ok(Json(FlowResponse {
        user_id,
        state: flow_state,
    }))
}
