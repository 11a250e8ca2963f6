//! HTTP surface: member-facing REST routes, the door-scan endpoint, and
//! the public user-existence lookup.

pub mod accounts;
pub mod admin;
pub mod flow;
pub mod pass;
pub mod photos;
pub mod profile;
pub mod quiz;

use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::flow::FlowEngine;
use crate::photos::ObjectStore;
use crate::store::Database;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub flow: Arc<FlowEngine>,
    pub photos: Arc<dyn ObjectStore>,
    pub config: Arc<ServerConfig>,
}

/// Build the full router with every route group and the HTTP trace layer.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(accounts::account_routes(state.clone()))
        .merge(profile::profile_routes(state.clone()))
        .merge(photos::photo_routes(state.clone()))
        .merge(quiz::quiz_routes(state.clone()))
        .merge(flow::flow_routes(state.clone()))
        .merge(admin::admin_routes(state.clone()))
        .merge(pass::pass_routes(state))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "crepusculo-pass"
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use tower::ServiceExt;

    use super::*;
    use crate::photos::LocalObjectStore;
    use crate::store::LibSqlBackend;

    async fn test_state(photo_dir: &std::path::Path) -> AppState {
        let backend = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let config = ServerConfig {
            photo_dir: photo_dir.to_path_buf(),
            ..ServerConfig::default()
        };
        AppState {
            db: backend.clone(),
            flow: Arc::new(FlowEngine::new(backend, Duration::from_secs(2))),
            photos: Arc::new(LocalObjectStore::new(
                photo_dir.to_path_buf(),
                config.public_url.clone(),
            )),
            config: Arc::new(config),
        }
    }

    #[tokio::test]
    async fn health_reports_service() {
        let tmp = tempfile::tempdir().unwrap();
        let app = router(test_state(tmp.path()).await);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn validate_pass_allows_any_origin() {
        let tmp = tempfile::tempdir().unwrap();
        let app = router(test_state(tmp.path()).await);

        let preflight = Request::builder()
            .method(Method::OPTIONS)
            .uri("/validate-pass")
            .header(header::ORIGIN, "https://scanner.example.org")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(preflight).await.unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn validate_pass_error_is_html_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        let app = router(test_state(tmp.path()).await);

        let response = app
            .oneshot(
                Request::get("/validate-pass?event=62_crepusculo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/html"));
    }
}
