//! Profile and application routes.

use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use super::AppState;
use super::flow::advance_or_refresh;
use crate::error::{ApiError, DatabaseError};
use crate::flow::FlowEvent;
use crate::profile::{self, ApplicationForm, Profile, username};

/// Build the profile routes.
pub fn profile_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/users/{user_id}/profile",
            get(get_profile).put(submit_application),
        )
        .route("/api/users/{user_id}/username", put(update_username))
        .with_state(state)
}

/// GET /api/users/{user_id}/profile
///
/// Creates a draft profile on first access.
async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    let profile = profile::load_or_create(state.db.as_ref(), &user_id).await?;
    Ok(Json(profile))
}

/// PUT /api/users/{user_id}/profile
///
/// Validates the application form against today's date and the current
/// photo count, then stores it. Every failing field is reported at once.
async fn submit_application(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(form): Json<ApplicationForm>,
) -> Result<Json<Profile>, ApiError> {
    let db = state.db.as_ref();
    profile::load_or_create(db, &user_id).await?;

    let photo_count = db.count_photos(&user_id).await?;
    let application = form.validate(Utc::now().date_naive(), photo_count)?;
    let updated = db.submit_application(&user_id, &application).await?;

    advance_or_refresh(&state, &user_id, FlowEvent::ApplicationSubmitted).await;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
struct UsernameRequest {
    username: String,
}

/// PUT /api/users/{user_id}/username
async fn update_username(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<UsernameRequest>,
) -> Result<Json<Profile>, ApiError> {
    let name = username::validate(&req.username)?;
    let db = state.db.as_ref();
    let current = profile::load_or_create(db, &user_id).await?;
    if current.username == name {
        return Ok(Json(current));
    }

    match db.update_username(&user_id, &name).await {
        Ok(()) => {}
        Err(DatabaseError::Constraint(_)) => {
            return Err(ApiError::Conflict("Username already taken".to_string()));
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!(user_id = %user_id, username = %name, "Username changed");

    let updated = db.get_profile(&user_id).await?.ok_or_else(|| DatabaseError::NotFound {
        entity: "Profile".to_string(),
        id: user_id.clone(),
    })?;
    Ok(Json(updated))
}
