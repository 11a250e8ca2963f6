//! Username generation and validation.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use crate::error::{DatabaseError, FieldError, ValidationError};
use crate::store::Database;

/// Numbered suffixes tried before falling back to a timestamp.
const MAX_SUFFIX: u32 = 1000;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_.]{3,30}$").expect("username regex compiles"));

/// Username seed derived from the local part of an e-mail address.
pub fn base_username(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let cleaned: String = local
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .collect();
    if cleaned.is_empty() {
        "member".to_string()
    } else {
        cleaned
    }
}

/// Candidates in the order they are tried: `base`, `base_1` … `base_1000`.
pub fn candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string()).chain((1..=MAX_SUFFIX).map(move |n| format!("{base}_{n}")))
}

/// Pick the first free username for `email`.
pub async fn generate_unique(db: &dyn Database, email: &str) -> Result<String, DatabaseError> {
    let base = base_username(email);
    for candidate in candidates(&base) {
        if !db.username_taken(&candidate).await? {
            return Ok(candidate);
        }
    }
    Ok(format!("{base}_{}", Utc::now().timestamp_millis()))
}

/// Validate a member-chosen username.
pub fn validate(username: &str) -> Result<String, ValidationError> {
    let username = username.trim().to_lowercase();
    if USERNAME_RE.is_match(&username) {
        Ok(username)
    } else {
        Err(ValidationError {
            fields: vec![FieldError {
                field: "username",
                message: "Username must be 3-30 characters of a-z, 0-9, '_' or '.'".to_string(),
            }],
        })
    }
}
