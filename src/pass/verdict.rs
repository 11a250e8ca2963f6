//! Door-scan verdicts for presented passes.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DatabaseError;
use crate::profile::{Profile, ProfileStatus};
use crate::store::Database;

/// Presentation color for a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictColor {
    Green,
    Yellow,
    Red,
}

impl VerdictColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }
}

/// Answer to "is this pass valid for this event".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassVerdict {
    pub status: String,
    pub color: VerdictColor,
    pub message: String,
    pub username: String,
    pub full_name: String,
    pub valid: bool,
}

impl PassVerdict {
    /// Verdict for an existing profile.
    pub fn for_profile(profile: &Profile) -> Self {
        let (status, color, message) = match profile.status {
            Some(ProfileStatus::Approved) => ("approved", VerdictColor::Green, "Valid pass — welcome!"),
            Some(ProfileStatus::ApprovedPlus) => (
                "approved_plus",
                VerdictColor::Green,
                "Valid pass — approved plus",
            ),
            Some(ProfileStatus::Pending) => (
                "pending",
                VerdictColor::Yellow,
                "Application pending approval",
            ),
            Some(ProfileStatus::Rejected) => ("rejected", VerdictColor::Red, "Application rejected"),
            None => ("not_submitted", VerdictColor::Yellow, "Application not submitted"),
        };
        Self {
            status: status.to_string(),
            color,
            message: message.to_string(),
            username: profile.username.clone(),
            full_name: profile
                .full_name
                .clone()
                .unwrap_or_else(|| "Unknown User".to_string()),
            valid: profile.is_approved(),
        }
    }

    /// Verdict for a request that could not be checked.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            color: VerdictColor::Red,
            message: message.into(),
            username: String::new(),
            full_name: String::new(),
            valid: false,
        }
    }
}

/// Reasons a pass could not be checked.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("Missing user ID")]
    MissingUserId,

    #[error("Unreadable QR code")]
    MalformedQuery,

    #[error("Wrong QR code for this event")]
    WrongEvent,

    #[error("User not found")]
    NotFound,

    #[error("System error, please try again")]
    Backend(#[from] DatabaseError),
}

impl PassError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingUserId | Self::MalformedQuery | Self::WrongEvent => 400,
            Self::NotFound => 404,
            Self::Backend(_) => 500,
        }
    }

    pub fn verdict(&self) -> PassVerdict {
        PassVerdict::error(self.to_string())
    }
}

/// Query parameters of a scanned pass.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PassQuery {
    pub user_id: Option<String>,
    pub event: Option<String>,
    pub format: Option<String>,
}

/// Check a scanned pass. Read-only: repeated scans change nothing.
pub async fn validate_pass(
    db: &dyn Database,
    expected_event: &str,
    query: &PassQuery,
) -> Result<PassVerdict, PassError> {
    let user_id = query
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(PassError::MissingUserId)?;

    if query.event.as_deref() != Some(expected_event) {
        return Err(PassError::WrongEvent);
    }

    let profile = db
        .get_profile(user_id)
        .await?
        .ok_or(PassError::NotFound)?;

    let verdict = PassVerdict::for_profile(&profile);
    info!(
        username = %profile.username,
        status = %verdict.status,
        valid = verdict.valid,
        "Pass validated"
    );
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Account;
    use crate::store::LibSqlBackend;

    const EVENT: &str = "62_crepusculo";

    fn query(user_id: Option<&str>, event: Option<&str>) -> PassQuery {
        PassQuery {
            user_id: user_id.map(String::from),
            event: event.map(String::from),
            format: None,
        }
    }

    async fn db_with(status: Option<ProfileStatus>) -> (LibSqlBackend, String) {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let account = Account::new("alice@example.com");
        db.insert_account(&account).await.unwrap();
        let mut profile = Profile::draft(&account.id, "alice");
        profile.full_name = Some("Alice Example".into());
        profile.status = status;
        db.insert_profile(&profile).await.unwrap();
        (db, account.id)
    }

    #[test]
    fn only_approved_statuses_are_valid() {
        let mut profile = Profile::draft("u1", "alice");
        let cases = [
            (Some(ProfileStatus::Approved), true, VerdictColor::Green),
            (Some(ProfileStatus::ApprovedPlus), true, VerdictColor::Green),
            (Some(ProfileStatus::Pending), false, VerdictColor::Yellow),
            (Some(ProfileStatus::Rejected), false, VerdictColor::Red),
            (None, false, VerdictColor::Yellow),
        ];
        let mut messages = std::collections::HashSet::new();
        for (status, valid, color) in cases {
            profile.status = status;
            let v = PassVerdict::for_profile(&profile);
            assert_eq!(v.valid, valid, "{status:?}");
            assert_eq!(v.color, color, "{status:?}");
            messages.insert(v.message);
        }
        assert_eq!(messages.len(), 5, "every status has its own message");
    }

    #[test]
    fn missing_full_name_is_labelled() {
        let profile = Profile::draft("u1", "alice");
        assert_eq!(PassVerdict::for_profile(&profile).full_name, "Unknown User");
    }

    #[tokio::test]
    async fn approved_profile_is_valid() {
        let (db, user_id) = db_with(Some(ProfileStatus::Approved)).await;
        let v = validate_pass(&db, EVENT, &query(Some(&user_id), Some(EVENT)))
            .await
            .unwrap();
        assert!(v.valid);
        assert_eq!(v.status, "approved");
        assert_eq!(v.username, "alice");
        assert_eq!(v.full_name, "Alice Example");
    }

    #[tokio::test]
    async fn rejected_profile_is_invalid() {
        let (db, user_id) = db_with(Some(ProfileStatus::Rejected)).await;
        let v = validate_pass(&db, EVENT, &query(Some(&user_id), Some(EVENT)))
            .await
            .unwrap();
        assert!(!v.valid);
        assert_eq!(v.status, "rejected");
    }

    #[tokio::test]
    async fn request_errors_are_distinct() {
        let (db, user_id) = db_with(Some(ProfileStatus::Approved)).await;

        let err = validate_pass(&db, EVENT, &query(None, Some(EVENT))).await.unwrap_err();
        assert!(matches!(err, PassError::MissingUserId));
        assert_eq!(err.status_code(), 400);

        let err = validate_pass(&db, EVENT, &query(Some("  "), Some(EVENT))).await.unwrap_err();
        assert!(matches!(err, PassError::MissingUserId));

        let err = validate_pass(&db, EVENT, &query(Some(&user_id), Some("61_crepusculo")))
            .await
            .unwrap_err();
        assert!(matches!(err, PassError::WrongEvent));
        assert_eq!(err.status_code(), 400);

        let err = validate_pass(&db, EVENT, &query(Some(&user_id), None)).await.unwrap_err();
        assert!(matches!(err, PassError::WrongEvent));

        let err = validate_pass(&db, EVENT, &query(Some("unknown"), Some(EVENT)))
            .await
            .unwrap_err();
        assert!(matches!(err, PassError::NotFound));
        assert_eq!(err.status_code(), 404);
        assert!(!err.verdict().valid);

        let err = PassError::MalformedQuery;
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.verdict().message, "Unreadable QR code");
    }

    #[tokio::test]
    async fn validation_is_read_only() {
        let (db, user_id) = db_with(Some(ProfileStatus::Approved)).await;
        let before = db.get_profile(&user_id).await.unwrap().unwrap();
        for _ in 0..3 {
            validate_pass(&db, EVENT, &query(Some(&user_id), Some(EVENT)))
                .await
                .unwrap();
        }
        let after = db.get_profile(&user_id).await.unwrap().unwrap();
        assert_eq!(before, after);
    }
}
