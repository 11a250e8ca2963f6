//! Admin-side mutations that drive approvals and pass tags.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use super::AppState;
use crate::error::ApiError;
use crate::profile::ProfileStatus;
use crate::store::NewTag;

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: ProfileStatus,
}

#[derive(Debug, Deserialize)]
struct TagsRequest {
    tag_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct CreateTagRequest {
    label: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    visible_to_client: bool,
}

/// Build the admin routes.
pub fn admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/admin/profiles/{user_id}/status", put(set_status))
        .route("/api/admin/profiles/{user_id}/tags", put(set_tags))
        .route("/api/admin/tags", post(create_tag))
        .with_state(state)
}

/// PUT /api/admin/profiles/{user_id}/status
///
/// The member's cached flow state is dropped so the next read re-derives.
async fn set_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<StatusCode, ApiError> {
    state.db.set_profile_status(&user_id, req.status).await?;
    state.flow.forget(&user_id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/admin/profiles/{user_id}/tags
async fn set_tags(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<TagsRequest>,
) -> Result<StatusCode, ApiError> {
    state.db.set_profile_tags(&user_id, &req.tag_ids).await?;
    info!(user_id = %user_id, count = req.tag_ids.len(), "Profile tags set");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/tags
async fn create_tag(
    State(state): State<AppState>,
    Json(req): Json<CreateTagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let label = req.label.trim();
    if label.is_empty() {
        return Err(ApiError::BadRequest("Tag label is required".to_string()));
    }
    let tag = state
        .db
        .insert_tag(&NewTag {
            label: label.to_string(),
            color: req.color,
            visible_to_client: req.visible_to_client,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(tag)))
}
