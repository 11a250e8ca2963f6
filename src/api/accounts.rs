//! Account registration and the public user-existence lookup.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use super::AppState;
use crate::error::{ApiError, DatabaseError, FieldError, ValidationError};
use crate::profile::Account;

#[derive(Debug, Default, Deserialize)]
struct EmailRequest {
    #[serde(default)]
    email: Option<String>,
}

/// Build the account routes.
pub fn account_routes(state: AppState) -> Router {
    let lookup_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/accounts", post(register))
        .route(
            "/check-user-exists",
            post(check_user_exists).layer(lookup_cors),
        )
        .with_state(state)
}

fn parse_email(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<EmailRequest>(body)
        .ok()
        .and_then(|r| r.email)
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
}

/// POST /api/accounts
///
/// Registers an account for an e-mail address. Stands in for the hosted
/// auth registry; there is no password handling.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.unwrap_or_default().trim().to_string();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed {
        return Err(ValidationError {
            fields: vec![FieldError {
                field: "email",
                message: "Please enter a valid email address".to_string(),
            }],
        }
        .into());
    }

    let account = Account::new(email);
    match state.db.insert_account(&account).await {
        Ok(()) => {}
        Err(DatabaseError::Constraint(_)) => {
            return Err(ApiError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    info!(user_id = %account.id, "Account registered");
    Ok((StatusCode::CREATED, Json(account)))
}

/// POST /check-user-exists
///
/// `{email}` → `{exists}`. Lets the sign-up form detect duplicates without
/// probing sign-up errors.
async fn check_user_exists(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let Some(email) = parse_email(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Email is required"})),
        );
    };

    match state.db.find_account_by_email(&email).await {
        Ok(account) => {
            let exists = account.is_some();
            info!(exists, "User existence checked");
            (StatusCode::OK, Json(serde_json::json!({"exists": exists})))
        }
        Err(e) => {
            error!(error = %e, "User existence check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to check user existence"})),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_extracted_and_trimmed() {
        assert_eq!(
            parse_email(br#"{"email":"  a@example.org "}"#).as_deref(),
            Some("a@example.org")
        );
        assert!(parse_email(br#"{"email":"   "}"#).is_none());
        assert!(parse_email(br#"{}"#).is_none());
        assert!(parse_email(b"not json").is_none());
    }
}
