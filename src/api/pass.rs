//! Member pass view and the door-scan validation endpoint.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use super::AppState;
use crate::error::{ApiError, DatabaseError};
use crate::pass::{self, PassFormat, PassQuery, PassVerdict, render_html};
use crate::profile::ProfileStatus;

#[derive(Debug, Serialize)]
struct PassTag {
    label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
}

#[derive(Debug, Serialize)]
struct PassView {
    full_name: String,
    username: String,
    status: ProfileStatus,
    validation_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_url: Option<String>,
    tags: Vec<PassTag>,
}

/// Build the pass routes.
pub fn pass_routes(state: AppState) -> Router {
    let scanner_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/users/{user_id}/pass", get(member_pass))
        .route("/validate-pass", get(validate_pass).layer(scanner_cors))
        .with_state(state)
}

/// GET /api/users/{user_id}/pass
///
/// Pass details for an approved member: identity, primary photo, visible
/// tags, and the URL encoded in the QR code.
async fn member_pass(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PassView>, ApiError> {
    let db = state.db.as_ref();
    let profile = db
        .get_profile(&user_id)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Profile".to_string(),
            id: user_id.clone(),
        })?;

    let status = match profile.status {
        Some(status) if status.is_approved() => status,
        _ => {
            return Err(ApiError::Forbidden(
                "Your pass will be available after your profile is approved".to_string(),
            ));
        }
    };

    let photo_url = db
        .list_photos(&user_id)
        .await?
        .into_iter()
        .find(|p| p.is_primary)
        .map(|p| p.photo_url);
    let tags = db
        .visible_tags(&profile.tag_ids)
        .await?
        .into_iter()
        .map(|t| PassTag {
            label: t.label,
            color: t.color,
        })
        .collect();
    let validation_url =
        pass::validation_url(&state.config.public_url, &user_id, &state.config.event_tag);

    Ok(Json(PassView {
        full_name: profile.full_name.unwrap_or_default(),
        username: profile.username,
        status,
        validation_url: validation_url.to_string(),
        photo_url,
        tags,
    }))
}

/// GET /validate-pass?user_id=<id>&event=<tag>[&format=json|html]
///
/// Unauthenticated and read-only. Every outcome, errors included, carries
/// a verdict body; an unparseable query is answered like any other bad scan.
async fn validate_pass(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
    query: Result<Query<PassQuery>, QueryRejection>,
) -> Response {
    let format = PassFormat::from_query_string(raw.as_deref());
    let result = match query {
        Ok(Query(query)) => {
            pass::validate_pass(state.db.as_ref(), &state.config.event_tag, &query).await
        }
        Err(rejection) => {
            tracing::debug!(reason = %rejection, "Unparseable pass query");
            Err(pass::PassError::MalformedQuery)
        }
    };

    let (status, verdict) = match result {
        Ok(verdict) => (StatusCode::OK, verdict),
        Err(e) => {
            if matches!(e, pass::PassError::Backend(_)) {
                tracing::error!(error = ?e, "Pass validation failed");
            } else {
                tracing::info!(reason = %e, "Pass rejected");
            }
            let status = StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, e.verdict())
        }
    };
    render(format, status, &verdict)
}

fn render(format: PassFormat, status: StatusCode, verdict: &PassVerdict) -> Response {
    match format {
        PassFormat::Json => (status, Json(verdict)).into_response(),
        PassFormat::Html => (status, Html(render_html(verdict))).into_response(),
    }
}
