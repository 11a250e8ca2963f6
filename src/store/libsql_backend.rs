//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Every write that has to keep
//! an invariant across rows (photo limit, single primary photo) is a single
//! SQL statement so concurrent requests on the shared connection cannot
//! interleave inside it.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::flow::FlowSource;
use crate::profile::{Account, Profile, ProfileStatus, Tag, UserPhoto, ValidApplication};
use crate::quiz::QuizCompletion;
use crate::store::migrations;
use crate::store::traits::{Database, NewTag};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    // Held open for the lifetime of `conn`.
    _db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            _db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            _db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn get_photo(
        &self,
        user_id: &str,
        photo_id: &str,
    ) -> Result<Option<UserPhoto>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PHOTO_COLUMNS} FROM user_photos WHERE id = ?1 AND user_id = ?2"),
                params![photo_id, user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_photo: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_photo(&row).map_err(|e| {
                DatabaseError::Query(format!("get_photo row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_photo: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

const ACCOUNT_COLUMNS: &str = "id, email, created_at";

const PROFILE_COLUMNS: &str = "id, user_id, username, full_name, gender, birthday, \
    social_media, introduction, previous_events, other_events, why_join, how_heard_about, \
    status, tag_ids, created_at, updated_at";

const PHOTO_COLUMNS: &str = "id, user_id, photo_url, object_key, is_primary, created_at";

const TAG_COLUMNS: &str = "id, label, color, visible_to_client";

/// Canonical write format for timestamps. Fixed precision keeps them
/// lexicographically ordered.
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

/// Map a write failure, surfacing uniqueness violations as `Constraint`.
fn write_err(op: &str, e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(format!("{op}: {msg}"))
    } else {
        DatabaseError::Query(format!("{op}: {msg}"))
    }
}

fn not_found(entity: &str, id: &str) -> DatabaseError {
    DatabaseError::NotFound {
        entity: entity.to_string(),
        id: id.to_string(),
    }
}

fn row_to_account(row: &libsql::Row) -> Result<Account, libsql::Error> {
    let created_str: String = row.get(2)?;
    Ok(Account {
        id: row.get(0)?,
        email: row.get(1)?,
        created_at: parse_datetime(&created_str),
    })
}

/// Map a libsql Row to a Profile.
///
/// Column order matches PROFILE_COLUMNS. Unknown enum values and malformed
/// JSON columns read as empty rather than failing the whole row.
fn row_to_profile(row: &libsql::Row) -> Result<Profile, libsql::Error> {
    let gender: Option<String> = row.get(4).ok();
    let birthday: Option<String> = row.get(5).ok();
    let social_media: String = row.get(6)?;
    let previous_events: String = row.get(8)?;
    let status: Option<String> = row.get(12).ok();
    let tag_ids: String = row.get(13)?;
    let created_str: String = row.get(14)?;
    let updated_str: String = row.get(15)?;

    Ok(Profile {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        full_name: row.get(3).ok(),
        gender: gender.and_then(|g| g.parse().ok()),
        birthday: birthday.and_then(|b| NaiveDate::parse_from_str(&b, "%Y-%m-%d").ok()),
        social_media: serde_json::from_str(&social_media).unwrap_or_default(),
        introduction: row.get(7).ok(),
        previous_events: previous_events.parse().unwrap_or_default(),
        other_events: row.get(9).ok(),
        why_join: row.get(10).ok(),
        how_heard_about: row.get(11).ok(),
        status: status.and_then(|s| s.parse().ok()),
        tag_ids: serde_json::from_str(&tag_ids).unwrap_or_default(),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

fn row_to_photo(row: &libsql::Row) -> Result<UserPhoto, libsql::Error> {
    let is_primary: i64 = row.get(4)?;
    let created_str: String = row.get(5)?;
    Ok(UserPhoto {
        id: row.get(0)?,
        user_id: row.get(1)?,
        photo_url: row.get(2)?,
        object_key: row.get(3)?,
        is_primary: is_primary != 0,
        created_at: parse_datetime(&created_str),
    })
}

fn row_to_tag(row: &libsql::Row) -> Result<Tag, libsql::Error> {
    let visible: i64 = row.get(3)?;
    Ok(Tag {
        id: row.get(0)?,
        label: row.get(1)?,
        color: row.get(2).ok(),
        visible_to_client: visible != 0,
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Accounts ────────────────────────────────────────────────────

    async fn insert_account(&self, account: &Account) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO accounts (id, email, created_at) VALUES (?1, ?2, ?3)",
                params![
                    account.id.as_str(),
                    account.email.trim(),
                    timestamp(&account.created_at),
                ],
            )
            .await
            .map_err(|e| write_err("insert_account", e))?;

        debug!(user_id = %account.id, "Account inserted into DB");
        Ok(())
    }

    async fn get_account(&self, id: &str) -> Result<Option<Account>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_account: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_account(&row).map_err(|e| {
                DatabaseError::Query(format!("get_account row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_account: {e}"))),
        }
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?1"),
                params![email.trim()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_account_by_email: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_account(&row).map_err(|e| {
                DatabaseError::Query(format!("find_account_by_email row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_account_by_email: {e}"))),
        }
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn username_taken(&self, username: &str) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM profiles WHERE username = ?1",
                params![username],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("username_taken: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("username_taken: {e}")))?;
                Ok(count > 0)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(DatabaseError::Query(format!("username_taken: {e}"))),
        }
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<(), DatabaseError> {
        let birthday = profile.birthday.map(|b| b.format("%Y-%m-%d").to_string());
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO profiles ({PROFILE_COLUMNS}) VALUES \
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
                ),
                params![
                    profile.id.as_str(),
                    profile.user_id.as_str(),
                    profile.username.as_str(),
                    opt_text(profile.full_name.as_deref()),
                    opt_text(profile.gender.map(|g| g.as_str())),
                    opt_text(birthday.as_deref()),
                    to_json(&profile.social_media)?,
                    opt_text(profile.introduction.as_deref()),
                    profile.previous_events.as_str(),
                    opt_text(profile.other_events.as_deref()),
                    opt_text(profile.why_join.as_deref()),
                    opt_text(profile.how_heard_about.as_deref()),
                    opt_text(profile.status.map(|s| s.as_str())),
                    to_json(&profile.tag_ids)?,
                    timestamp(&profile.created_at),
                    timestamp(&profile.updated_at),
                ],
            )
            .await
            .map_err(|e| write_err("insert_profile", e))?;

        debug!(user_id = %profile.user_id, username = %profile.username, "Profile inserted into DB");
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_profile(&row).map_err(|e| {
                DatabaseError::Query(format!("get_profile row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_profile: {e}"))),
        }
    }

    async fn submit_application(
        &self,
        user_id: &str,
        application: &ValidApplication,
    ) -> Result<Profile, DatabaseError> {
        let social_media = to_json(&application.social_media)?;
        let birthday = application.birthday.format("%Y-%m-%d").to_string();

        // Compare-and-set on the previous status so a concurrent admin
        // decision is never overwritten with a stale one.
        for _ in 0..3 {
            let current = self
                .get_profile(user_id)
                .await?
                .ok_or_else(|| not_found("Profile", user_id))?;
            let next = ProfileStatus::after_edit(current.status);

            let changed = self
                .conn()
                .execute(
                    "UPDATE profiles SET full_name = ?1, gender = ?2, birthday = ?3, \
                     social_media = ?4, introduction = ?5, previous_events = ?6, \
                     other_events = ?7, why_join = ?8, how_heard_about = ?9, status = ?10, \
                     updated_at = ?11 WHERE user_id = ?12 AND status IS ?13",
                    params![
                        application.full_name.as_str(),
                        opt_text(application.gender.map(|g| g.as_str())),
                        birthday.as_str(),
                        social_media.as_str(),
                        application.introduction.as_str(),
                        application.previous_events.as_str(),
                        opt_text(application.other_events.as_deref()),
                        application.why_join.as_str(),
                        opt_text(application.how_heard_about.as_deref()),
                        next.as_str(),
                        timestamp(&Utc::now()),
                        user_id,
                        opt_text(current.status.map(|s| s.as_str())),
                    ],
                )
                .await
                .map_err(|e| write_err("submit_application", e))?;

            if changed > 0 {
                info!(user_id = %user_id, status = %next, "Application submitted");
                return self
                    .get_profile(user_id)
                    .await?
                    .ok_or_else(|| not_found("Profile", user_id));
            }
            debug!(user_id = %user_id, "Status changed during submit, retrying");
        }

        Err(DatabaseError::Query(format!(
            "submit_application: status for {user_id} kept changing"
        )))
    }

    async fn update_username(&self, user_id: &str, username: &str) -> Result<(), DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE profiles SET username = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![username, timestamp(&Utc::now()), user_id],
            )
            .await
            .map_err(|e| write_err("update_username", e))?;

        if changed == 0 {
            return Err(not_found("Profile", user_id));
        }
        Ok(())
    }

    async fn set_profile_status(
        &self,
        user_id: &str,
        status: ProfileStatus,
    ) -> Result<(), DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE profiles SET status = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![status.as_str(), timestamp(&Utc::now()), user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_profile_status: {e}")))?;

        if changed == 0 {
            return Err(not_found("Profile", user_id));
        }
        info!(user_id = %user_id, status = %status, "Profile status updated");
        Ok(())
    }

    async fn set_profile_tags(&self, user_id: &str, tag_ids: &[i64]) -> Result<(), DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE profiles SET tag_ids = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![to_json(tag_ids)?, timestamp(&Utc::now()), user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_profile_tags: {e}")))?;

        if changed == 0 {
            return Err(not_found("Profile", user_id));
        }
        Ok(())
    }

    // ── Photos ──────────────────────────────────────────────────────

    async fn list_photos(&self, user_id: &str) -> Result<Vec<UserPhoto>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {PHOTO_COLUMNS} FROM user_photos WHERE user_id = ?1 \
                     ORDER BY created_at DESC, rowid DESC"
                ),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_photos: {e}")))?;

        let mut photos = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_photos: {e}")))?
        {
            photos.push(
                row_to_photo(&row)
                    .map_err(|e| DatabaseError::Query(format!("list_photos row parse: {e}")))?,
            );
        }
        Ok(photos)
    }

    async fn count_photos(&self, user_id: &str) -> Result<usize, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM user_photos WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("count_photos: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("count_photos: {e}")))?;
                Ok(count.max(0) as usize)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count_photos: {e}"))),
        }
    }

    async fn add_photo(&self, photo: &UserPhoto, max: usize) -> Result<UserPhoto, DatabaseError> {
        let inserted = self
            .conn()
            .execute(
                "INSERT INTO user_photos (id, user_id, photo_url, object_key, is_primary, created_at) \
                 SELECT ?1, ?2, ?3, ?4, \
                        NOT EXISTS (SELECT 1 FROM user_photos WHERE user_id = ?2), ?5 \
                 WHERE (SELECT COUNT(*) FROM user_photos WHERE user_id = ?2) < ?6",
                params![
                    photo.id.as_str(),
                    photo.user_id.as_str(),
                    photo.photo_url.as_str(),
                    photo.object_key.as_str(),
                    timestamp(&photo.created_at),
                    max as i64,
                ],
            )
            .await
            .map_err(|e| write_err("add_photo", e))?;

        if inserted == 0 {
            return Err(DatabaseError::Constraint(format!(
                "You can upload maximum {max} photos"
            )));
        }

        let stored = self
            .get_photo(&photo.user_id, &photo.id)
            .await?
            .ok_or_else(|| not_found("Photo", &photo.id))?;
        debug!(user_id = %stored.user_id, photo_id = %stored.id, primary = stored.is_primary, "Photo added");
        Ok(stored)
    }

    async fn delete_photo(
        &self,
        user_id: &str,
        photo_id: &str,
    ) -> Result<UserPhoto, DatabaseError> {
        let photo = self
            .get_photo(user_id, photo_id)
            .await?
            .ok_or_else(|| not_found("Photo", photo_id))?;

        let deleted = self
            .conn()
            .execute(
                "DELETE FROM user_photos WHERE id = ?1 AND user_id = ?2",
                params![photo_id, user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_photo: {e}")))?;
        if deleted == 0 {
            return Err(not_found("Photo", photo_id));
        }

        // Promote the newest remaining photo unless a primary still exists.
        let promoted = self
            .conn()
            .execute(
                "UPDATE user_photos SET is_primary = 1 \
                 WHERE id = (SELECT id FROM user_photos WHERE user_id = ?1 \
                             ORDER BY created_at DESC, rowid DESC LIMIT 1) \
                   AND NOT EXISTS (SELECT 1 FROM user_photos WHERE user_id = ?1 AND is_primary = 1)",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_photo promote: {e}")))?;

        debug!(user_id = %user_id, photo_id = %photo_id, promoted = promoted > 0, "Photo deleted");
        Ok(photo)
    }

    async fn set_primary_photo(&self, user_id: &str, photo_id: &str) -> Result<(), DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE user_photos SET is_primary = (id = ?2) \
                 WHERE user_id = ?1 \
                   AND EXISTS (SELECT 1 FROM user_photos WHERE id = ?2 AND user_id = ?1)",
                params![user_id, photo_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_primary_photo: {e}")))?;

        if changed == 0 {
            return Err(not_found("Photo", photo_id));
        }
        debug!(user_id = %user_id, photo_id = %photo_id, "Primary photo set");
        Ok(())
    }

    // ── Quiz ────────────────────────────────────────────────────────

    async fn get_quiz_completion(
        &self,
        user_id: &str,
    ) -> Result<Option<QuizCompletion>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT user_id, answers, completed_at FROM code_of_conduct_tests WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_quiz_completion: {e}")))?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(DatabaseError::Query(format!("get_quiz_completion: {e}"))),
        };

        let parse = |e: libsql::Error| DatabaseError::Query(format!("get_quiz_completion row parse: {e}"));
        let answers: String = row.get(1).map_err(parse)?;
        let completed_str: String = row.get(2).map_err(parse)?;
        Ok(Some(QuizCompletion {
            user_id: row.get(0).map_err(parse)?,
            answers: serde_json::from_str(&answers)
                .map_err(|e| DatabaseError::Serialization(format!("quiz answers: {e}")))?,
            completed_at: parse_datetime(&completed_str),
        }))
    }

    async fn insert_quiz_completion(
        &self,
        completion: &QuizCompletion,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO code_of_conduct_tests (user_id, answers, completed_at) VALUES (?1, ?2, ?3)",
                params![
                    completion.user_id.as_str(),
                    to_json(&completion.answers)?,
                    timestamp(&completion.completed_at),
                ],
            )
            .await
            .map_err(|e| write_err("insert_quiz_completion", e))?;

        info!(user_id = %completion.user_id, "Quiz completion recorded");
        Ok(())
    }

    // ── Tags ────────────────────────────────────────────────────────

    async fn insert_tag(&self, tag: &NewTag) -> Result<Tag, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "INSERT INTO tags (label, color, visible_to_client) VALUES (?1, ?2, ?3) \
                     RETURNING {TAG_COLUMNS}"
                ),
                params![
                    tag.label.as_str(),
                    opt_text(tag.color.as_deref()),
                    tag.visible_to_client as i64,
                ],
            )
            .await
            .map_err(|e| write_err("insert_tag", e))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_tag(&row)
                .map_err(|e| DatabaseError::Query(format!("insert_tag row parse: {e}"))),
            Ok(None) => Err(DatabaseError::Query("insert_tag: no row returned".into())),
            Err(e) => Err(DatabaseError::Query(format!("insert_tag: {e}"))),
        }
    }

    async fn visible_tags(&self, ids: &[i64]) -> Result<Vec<Tag>, DatabaseError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {TAG_COLUMNS} FROM tags WHERE visible_to_client = 1 \
                     AND id IN (SELECT value FROM json_each(?1)) ORDER BY id"
                ),
                params![to_json(ids)?],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("visible_tags: {e}")))?;

        let mut tags = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("visible_tags: {e}")))?
        {
            tags.push(
                row_to_tag(&row)
                    .map_err(|e| DatabaseError::Query(format!("visible_tags row parse: {e}")))?,
            );
        }
        Ok(tags)
    }
}

// ── Flow source ─────────────────────────────────────────────────────

#[async_trait]
impl FlowSource for LibSqlBackend {
    async fn fetch_account(&self, user_id: &str) -> Result<Option<Account>, DatabaseError> {
        self.get_account(user_id).await
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError> {
        self.get_profile(user_id).await
    }

    async fn fetch_quiz(&self, user_id: &str) -> Result<Option<QuizCompletion>, DatabaseError> {
        self.get_quiz_completion(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Gender, PreviousEvents};
    use crate::quiz::Answers;
    use chrono::Duration;
    use uuid::Uuid;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    async fn db_with_profile(user_id: &str) -> LibSqlBackend {
        let db = test_db().await;
        db.insert_profile(&Profile::draft(user_id, format!("{user_id}_name")))
            .await
            .unwrap();
        db
    }

    fn application() -> ValidApplication {
        ValidApplication {
            full_name: "Alice Example".into(),
            gender: Some(Gender::Female),
            birthday: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
            social_media: vec!["https://instagram.com/alice".into()],
            introduction: "x".repeat(60),
            previous_events: PreviousEvents::Once,
            other_events: Some("Fetish night".into()),
            why_join: "y".repeat(60),
            how_heard_about: None,
        }
    }

    fn photo(user_id: &str, age_secs: i64) -> UserPhoto {
        let id = Uuid::new_v4().to_string();
        UserPhoto {
            photo_url: format!("https://pass.example.org/photos/{user_id}/{id}.jpg"),
            object_key: format!("{user_id}/{id}.jpg"),
            id,
            user_id: user_id.to_string(),
            is_primary: false,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    async fn primaries(db: &LibSqlBackend, user_id: &str) -> Vec<String> {
        db.list_photos(user_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.is_primary)
            .map(|p| p.id)
            .collect()
    }

    // ── Account tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn account_email_lookup_ignores_case() {
        let db = test_db().await;
        let account = Account::new("Alice@Example.org");
        db.insert_account(&account).await.unwrap();

        let found = db
            .find_account_by_email("alice@example.ORG")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, account.id);
        assert!(db.find_account_by_email("bob@example.org").await.unwrap().is_none());

        let dup = db.insert_account(&Account::new("ALICE@example.org")).await;
        assert!(matches!(dup, Err(DatabaseError::Constraint(_))));
    }

    #[tokio::test]
    async fn get_account_not_found() {
        let db = test_db().await;
        assert!(db.get_account("nobody").await.unwrap().is_none());
    }

    // ── Profile tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn draft_profile_round_trips() {
        let db = db_with_profile("u1").await;
        let profile = db.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.username, "u1_name");
        assert!(profile.status.is_none());
        assert!(profile.social_media.is_empty());
        assert_eq!(profile.previous_events, PreviousEvents::No);
        assert!(db.username_taken("u1_name").await.unwrap());
        assert!(!db.username_taken("someone_else").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_username_is_a_constraint() {
        let db = db_with_profile("u1").await;
        let result = db.insert_profile(&Profile::draft("u2", "u1_name")).await;
        assert!(matches!(result, Err(DatabaseError::Constraint(_))));

        db.insert_profile(&Profile::draft("u2", "other")).await.unwrap();
        let rename = db.update_username("u2", "u1_name").await;
        assert!(matches!(rename, Err(DatabaseError::Constraint(_))));
    }

    #[tokio::test]
    async fn submit_application_stores_answers_and_sets_pending() {
        let db = db_with_profile("u1").await;
        let profile = db.submit_application("u1", &application()).await.unwrap();

        assert_eq!(profile.status, Some(ProfileStatus::Pending));
        assert_eq!(profile.full_name.as_deref(), Some("Alice Example"));
        assert_eq!(profile.gender, Some(Gender::Female));
        assert_eq!(profile.birthday, NaiveDate::from_ymd_opt(1990, 5, 17));
        assert_eq!(profile.social_media, vec!["https://instagram.com/alice"]);
        assert_eq!(profile.previous_events, PreviousEvents::Once);
        assert!(profile.how_heard_about.is_none());
    }

    #[tokio::test]
    async fn resubmitting_resets_approval_but_keeps_approved_plus() {
        let db = db_with_profile("u1").await;

        db.set_profile_status("u1", ProfileStatus::Approved).await.unwrap();
        let edited = db.submit_application("u1", &application()).await.unwrap();
        assert_eq!(edited.status, Some(ProfileStatus::Pending));

        db.set_profile_status("u1", ProfileStatus::ApprovedPlus).await.unwrap();
        let edited = db.submit_application("u1", &application()).await.unwrap();
        assert_eq!(edited.status, Some(ProfileStatus::ApprovedPlus));
    }

    #[tokio::test]
    async fn updates_on_missing_profile_are_not_found() {
        let db = test_db().await;
        assert!(matches!(
            db.submit_application("ghost", &application()).await,
            Err(DatabaseError::NotFound { .. })
        ));
        assert!(matches!(
            db.set_profile_status("ghost", ProfileStatus::Approved).await,
            Err(DatabaseError::NotFound { .. })
        ));
        assert!(matches!(
            db.update_username("ghost", "name").await,
            Err(DatabaseError::NotFound { .. })
        ));
    }

    // ── Photo tests ─────────────────────────────────────────────────

    #[tokio::test]
    async fn first_photo_becomes_primary() {
        let db = test_db().await;
        let first = db.add_photo(&photo("u1", 10), 5).await.unwrap();
        let second = db.add_photo(&photo("u1", 5), 5).await.unwrap();

        assert!(first.is_primary);
        assert!(!second.is_primary);
        assert_eq!(db.count_photos("u1").await.unwrap(), 2);

        let listed = db.list_photos("u1").await.unwrap();
        assert_eq!(listed[0].id, second.id, "newest first");
    }

    #[tokio::test]
    async fn photo_limit_is_enforced() {
        let db = test_db().await;
        for i in 0..5 {
            db.add_photo(&photo("u1", 100 - i), 5).await.unwrap();
        }
        let sixth = db.add_photo(&photo("u1", 1), 5).await;
        assert!(matches!(sixth, Err(DatabaseError::Constraint(_))));
        assert_eq!(db.count_photos("u1").await.unwrap(), 5);

        // Another user is unaffected.
        db.add_photo(&photo("u2", 1), 5).await.unwrap();
    }

    #[tokio::test]
    async fn deleting_primary_promotes_newest_remaining() {
        let db = test_db().await;
        let oldest = db.add_photo(&photo("u1", 30), 5).await.unwrap();
        let middle = db.add_photo(&photo("u1", 20), 5).await.unwrap();
        let newest = db.add_photo(&photo("u1", 10), 5).await.unwrap();
        assert!(oldest.is_primary);

        let removed = db.delete_photo("u1", &oldest.id).await.unwrap();
        assert_eq!(removed.object_key, oldest.object_key);
        assert_eq!(primaries(&db, "u1").await, vec![newest.id.clone()]);

        db.delete_photo("u1", &middle.id).await.unwrap();
        assert_eq!(primaries(&db, "u1").await, vec![newest.id.clone()]);

        db.delete_photo("u1", &newest.id).await.unwrap();
        assert!(db.list_photos("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn photos_are_scoped_to_their_owner() {
        let db = test_db().await;
        let mine = db.add_photo(&photo("u1", 10), 5).await.unwrap();

        assert!(matches!(
            db.delete_photo("u2", &mine.id).await,
            Err(DatabaseError::NotFound { .. })
        ));
        assert!(matches!(
            db.set_primary_photo("u2", &mine.id).await,
            Err(DatabaseError::NotFound { .. })
        ));
        assert_eq!(primaries(&db, "u1").await, vec![mine.id]);
    }

    #[tokio::test]
    async fn set_primary_switches_the_flag() {
        let db = test_db().await;
        let a = db.add_photo(&photo("u1", 20), 5).await.unwrap();
        let b = db.add_photo(&photo("u1", 10), 5).await.unwrap();

        db.set_primary_photo("u1", &b.id).await.unwrap();
        assert_eq!(primaries(&db, "u1").await, vec![b.id.clone()]);

        db.set_primary_photo("u1", &a.id).await.unwrap();
        assert_eq!(primaries(&db, "u1").await, vec![a.id]);
    }

    #[tokio::test]
    async fn concurrent_set_primary_leaves_exactly_one() {
        let db = Arc::new(test_db().await);
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(db.add_photo(&photo("u1", 50 - i), 5).await.unwrap().id);
        }

        let mut set = tokio::task::JoinSet::new();
        for round in 0..4 {
            for id in &ids {
                let db = db.clone();
                let id = id.clone();
                set.spawn(async move {
                    if round % 2 == 0 {
                        db.set_primary_photo("u1", &id).await
                    } else {
                        tokio::task::yield_now().await;
                        db.set_primary_photo("u1", &id).await
                    }
                });
            }
        }
        while let Some(result) = set.join_next().await {
            result.unwrap().unwrap();
        }

        assert_eq!(primaries(&db, "u1").await.len(), 1);
    }

    // ── Quiz tests ──────────────────────────────────────────────────

    #[tokio::test]
    async fn quiz_completion_is_recorded_once() {
        let db = test_db().await;
        assert!(db.get_quiz_completion("u1").await.unwrap().is_none());

        let answers: Answers = [(1, 0), (2, 2)].into_iter().collect();
        db.insert_quiz_completion(&QuizCompletion::new("u1", answers.clone()))
            .await
            .unwrap();

        let stored = db.get_quiz_completion("u1").await.unwrap().unwrap();
        assert_eq!(stored.answers, answers);

        let again = db
            .insert_quiz_completion(&QuizCompletion::new("u1", answers))
            .await;
        assert!(matches!(again, Err(DatabaseError::Constraint(_))));
    }

    // ── Tag tests ───────────────────────────────────────────────────

    #[tokio::test]
    async fn only_visible_tags_are_returned() {
        let db = test_db().await;
        let vip = db
            .insert_tag(&NewTag {
                label: "VIP".into(),
                color: Some("#d4af37".into()),
                visible_to_client: true,
            })
            .await
            .unwrap();
        let internal = db
            .insert_tag(&NewTag {
                label: "Watch".into(),
                color: None,
                visible_to_client: false,
            })
            .await
            .unwrap();

        let tags = db.visible_tags(&[vip.id, internal.id, 999]).await.unwrap();
        assert_eq!(tags, vec![vip]);
        assert!(db.visible_tags(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn profile_tags_round_trip() {
        let db = db_with_profile("u1").await;
        db.set_profile_tags("u1", &[3, 1]).await.unwrap();
        assert_eq!(db.get_profile("u1").await.unwrap().unwrap().tag_ids, vec![3, 1]);
    }

    // ── Flow source ─────────────────────────────────────────────────

    #[tokio::test]
    async fn flow_source_reads_through() {
        let db = test_db().await;
        let account = Account::new("a@example.org");
        db.insert_account(&account).await.unwrap();

        let source: &dyn FlowSource = &db;
        assert_eq!(
            source.fetch_account(&account.id).await.unwrap().unwrap().email,
            "a@example.org"
        );
        assert!(source.fetch_profile(&account.id).await.unwrap().is_none());
        assert!(source.fetch_quiz(&account.id).await.unwrap().is_none());
    }
}
