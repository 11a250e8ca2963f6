//! Photo upload, removal, primary selection, and object serving.

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use serde::Deserialize;

use super::AppState;
use crate::config::rules;
use crate::error::ApiError;
use crate::photos::{self, content_type_for};
use crate::profile::UserPhoto;

#[derive(Debug, Deserialize)]
struct UploadParams {
    ext: Option<String>,
}

/// Build the photo routes.
pub fn photo_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/users/{user_id}/photos",
            get(list_photos)
                .post(upload_photo)
                .layer(DefaultBodyLimit::max(rules::MAX_PHOTO_BYTES)),
        )
        .route(
            "/api/users/{user_id}/photos/{photo_id}",
            delete(delete_photo),
        )
        .route(
            "/api/users/{user_id}/photos/{photo_id}/primary",
            put(set_primary),
        )
        .route("/photos/{*key}", get(serve_photo))
        .with_state(state)
}

/// GET /api/users/{user_id}/photos — newest first.
async fn list_photos(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<UserPhoto>>, ApiError> {
    Ok(Json(state.db.list_photos(&user_id).await?))
}

/// POST /api/users/{user_id}/photos?ext=jpg
///
/// The request body is the raw image.
async fn upload_photo(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let ext = params
        .ext
        .ok_or_else(|| ApiError::BadRequest("Missing ext parameter".to_string()))?;
    if state.db.get_account(&user_id).await?.is_none() {
        return Err(ApiError::NotFound("Account not found".to_string()));
    }

    let photo = photos::upload(
        state.db.as_ref(),
        state.photos.as_ref(),
        &user_id,
        &ext,
        &body,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(photo)))
}

/// DELETE /api/users/{user_id}/photos/{photo_id}
async fn delete_photo(
    State(state): State<AppState>,
    Path((user_id, photo_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    photos::remove(
        state.db.as_ref(),
        state.photos.as_ref(),
        &user_id,
        &photo_id,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/users/{user_id}/photos/{photo_id}/primary
///
/// Returns the user's photos after the switch.
async fn set_primary(
    State(state): State<AppState>,
    Path((user_id, photo_id)): Path<(String, String)>,
) -> Result<Json<Vec<UserPhoto>>, ApiError> {
    state.db.set_primary_photo(&user_id, &photo_id).await?;
    Ok(Json(state.db.list_photos(&user_id).await?))
}

/// GET /photos/{*key}
async fn serve_photo(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = state.photos.read(&key).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&key))], bytes))
}
