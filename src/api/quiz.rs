//! Code of Conduct quiz routes.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;
use super::flow::advance_or_refresh;
use crate::error::{ApiError, DatabaseError, QuizError};
use crate::flow::{FlowEvent, FlowState};
use crate::quiz::{self, Answers, PublicQuestion, QuizCompletion};

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    #[serde(default)]
    answers: Answers,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    passed: bool,
    state: FlowState,
}

/// Build the quiz routes.
pub fn quiz_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/quiz", get(questions))
        .route("/api/users/{user_id}/quiz", post(submit))
        .with_state(state)
}

/// GET /api/quiz — questions without their answers.
async fn questions() -> Json<Vec<PublicQuestion>> {
    Json(quiz::public_questions())
}

/// POST /api/users/{user_id}/quiz
///
/// Grades the answers and records the single completion for the account.
/// The quiz opens once the profile is approved.
async fn submit(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let db = state.db.as_ref();
    if db.get_account(&user_id).await?.is_none() {
        return Err(ApiError::NotFound("Account not found".to_string()));
    }
    let approved = db
        .get_profile(&user_id)
        .await?
        .is_some_and(|profile| profile.is_approved());
    if !approved {
        return Err(ApiError::Forbidden(
            "The Code of Conduct quiz opens after your profile is approved".to_string(),
        ));
    }
    if db.get_quiz_completion(&user_id).await?.is_some() {
        return Err(QuizError::AlreadyCompleted.into());
    }

    quiz::grade(&req.answers)?;

    match db
        .insert_quiz_completion(&QuizCompletion::new(&user_id, req.answers))
        .await
    {
        Ok(()) => {}
        Err(DatabaseError::Constraint(_)) => return Err(QuizError::AlreadyCompleted.into()),
        Err(e) => return Err(e.into()),
    }
    info!(user_id = %user_id, "Quiz passed");

    let flow_state = advance_or_refresh(&state, &user_id, FlowEvent::QuizPassed).await;
    Ok(Json(SubmitResponse {
        passed: true,
        state: flow_state,
    }))
}
