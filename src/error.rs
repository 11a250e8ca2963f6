//! Error types for the Crepusculo pass service.

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::flow::{FlowEvent, FlowState};

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Object storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Photo upload/delete errors.
#[derive(Debug, thiserror::Error)]
pub enum PhotoError {
    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("Empty upload")]
    Empty,

    #[error("Upload exceeds {0} bytes")]
    TooLarge(usize),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// A single failing form field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Form validation failure carrying every failing field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} field(s) failed validation", .fields.len())]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    /// Whether a given field is among the failures.
    pub fn has(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }
}

/// Onboarding flow errors.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Cannot apply {event} while in state {state}")]
    InvalidTransition { state: FlowState, event: FlowEvent },

    #[error("Flow derivation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Flow derivation failed: {0}")]
    Source(#[from] DatabaseError),
}

/// Rules quiz errors.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("Please select an answer for question {question_id}")]
    Unanswered { question_id: u32 },

    #[error("Incorrect answer for question {question_id}. Please review the Code of Conduct and try again.")]
    Incorrect { question_id: u32 },

    #[error("Quiz already completed")]
    AlreadyCompleted,
}

/// Error returned by HTTP handlers.
///
/// Internal variants log their detail and answer with a generic message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Validation failed")]
    Validation(ValidationError),

    #[error("{0}")]
    Unprocessable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) | Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { entity, .. } => Self::NotFound(format!("{entity} not found")),
            DatabaseError::Constraint(msg) => Self::Conflict(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidKey(msg) => Self::BadRequest(msg),
            StorageError::NotFound(key) => Self::NotFound(format!("{key} not found")),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<PhotoError> for ApiError {
    fn from(e: PhotoError) -> Self {
        match e {
            PhotoError::Storage(e) => e.into(),
            PhotoError::Database(e) => e.into(),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<QuizError> for ApiError {
    fn from(e: QuizError) -> Self {
        match e {
            QuizError::AlreadyCompleted => Self::Conflict(e.to_string()),
            other => Self::Unprocessable(other.to_string()),
        }
    }
}

impl From<FlowError> for ApiError {
    fn from(e: FlowError) -> Self {
        match e {
            FlowError::InvalidTransition { .. } => Self::Conflict(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(v) => serde_json::json!({
                "error": "Validation failed",
                "fields": v.fields,
            }),
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                serde_json::json!({"error": "Internal server error"})
            }
            other => serde_json::json!({"error": other.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}
