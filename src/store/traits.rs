//! Unified `Database` trait — single async interface for all persistence.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::profile::{Account, Profile, ProfileStatus, Tag, UserPhoto, ValidApplication};
use crate::quiz::QuizCompletion;

/// A tag before it has been assigned an id.
#[derive(Debug, Clone)]
pub struct NewTag {
    pub label: String,
    pub color: Option<String>,
    pub visible_to_client: bool,
}

/// Backend-agnostic database trait covering accounts, profiles, photos,
/// quiz completions, and tags.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Accounts ────────────────────────────────────────────────────

    /// Insert an account. A duplicate email is a `Constraint` error.
    async fn insert_account(&self, account: &Account) -> Result<(), DatabaseError>;

    async fn get_account(&self, id: &str) -> Result<Option<Account>, DatabaseError>;

    /// Case-insensitive email lookup.
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    async fn username_taken(&self, username: &str) -> Result<bool, DatabaseError>;

    /// Insert a profile. Duplicate `user_id` or `username` is a `Constraint` error.
    async fn insert_profile(&self, profile: &Profile) -> Result<(), DatabaseError>;

    /// Profile owned by the given account, if any.
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError>;

    /// Store application answers and move the status along: `approved_plus`
    /// is kept, anything else becomes `pending`. Returns the updated profile.
    async fn submit_application(
        &self,
        user_id: &str,
        application: &ValidApplication,
    ) -> Result<Profile, DatabaseError>;

    async fn update_username(&self, user_id: &str, username: &str) -> Result<(), DatabaseError>;

    async fn set_profile_status(
        &self,
        user_id: &str,
        status: ProfileStatus,
    ) -> Result<(), DatabaseError>;

    async fn set_profile_tags(&self, user_id: &str, tag_ids: &[i64]) -> Result<(), DatabaseError>;

    // ── Photos ──────────────────────────────────────────────────────

    /// Photos of a user, newest first.
    async fn list_photos(&self, user_id: &str) -> Result<Vec<UserPhoto>, DatabaseError>;

    async fn count_photos(&self, user_id: &str) -> Result<usize, DatabaseError>;

    /// Insert a photo unless the user already has `max` photos. The first
    /// photo of a user becomes primary. Returns the stored row.
    async fn add_photo(&self, photo: &UserPhoto, max: usize) -> Result<UserPhoto, DatabaseError>;

    /// Delete a photo. If it was primary, the newest remaining photo is
    /// promoted. Returns the deleted row.
    async fn delete_photo(&self, user_id: &str, photo_id: &str)
    -> Result<UserPhoto, DatabaseError>;

    /// Make `photo_id` the only primary photo of the user in one statement.
    async fn set_primary_photo(&self, user_id: &str, photo_id: &str) -> Result<(), DatabaseError>;

    // ── Quiz ────────────────────────────────────────────────────────

    async fn get_quiz_completion(
        &self,
        user_id: &str,
    ) -> Result<Option<QuizCompletion>, DatabaseError>;

    /// Record a passed quiz. A second completion is a `Constraint` error.
    async fn insert_quiz_completion(&self, completion: &QuizCompletion)
    -> Result<(), DatabaseError>;

    // ── Tags ────────────────────────────────────────────────────────

    async fn insert_tag(&self, tag: &NewTag) -> Result<Tag, DatabaseError>;

    /// Tags among `ids` that are visible to clients, ordered by id.
    async fn visible_tags(&self, ids: &[i64]) -> Result<Vec<Tag>, DatabaseError>;
}
