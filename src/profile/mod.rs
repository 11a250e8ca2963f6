//! Membership profiles — records, application form, usernames.

pub mod application;
pub mod model;
pub mod username;

use crate::error::DatabaseError;
use crate::store::Database;

pub use application::{ApplicationForm, ValidApplication, age_on};
pub use model::{Account, Gender, PreviousEvents, Profile, ProfileStatus, Tag, UserPhoto};

const CREATE_ATTEMPTS: usize = 3;

/// Fetch the account's profile, creating a draft with a generated username
/// on first access.
pub async fn load_or_create(db: &dyn Database, user_id: &str) -> Result<Profile, DatabaseError> {
    if let Some(profile) = db.get_profile(user_id).await? {
        return Ok(profile);
    }

    let account = db
        .get_account(user_id)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Account".to_string(),
            id: user_id.to_string(),
        })?;

    for _ in 0..CREATE_ATTEMPTS {
        let name = username::generate_unique(db, &account.email).await?;
        let draft = Profile::draft(user_id, name);
        match db.insert_profile(&draft).await {
            Ok(()) => {
                tracing::info!(user_id = %user_id, username = %draft.username, "Profile created");
                return Ok(draft);
            }
            // Either a concurrent first access won the insert, or another
            // account took the candidate username in the meantime.
            Err(DatabaseError::Constraint(_)) => {
                if let Some(profile) = db.get_profile(user_id).await? {
                    return Ok(profile);
                }
                tracing::debug!(user_id = %user_id, username = %draft.username, "Username taken, retrying");
            }
            Err(e) => return Err(e),
        }
    }
    Err(DatabaseError::Constraint(format!(
        "no free username for account {user_id}"
    )))
}
