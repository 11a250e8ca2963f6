//! Profile photos: object storage plus the rows that point at it.

pub mod storage;

use chrono::Utc;
use uuid::Uuid;

use crate::config::rules;
use crate::error::PhotoError;
use crate::profile::UserPhoto;
use crate::store::Database;

pub use storage::{LocalObjectStore, ObjectStore, content_type_for, normalize_extension};

/// Object key for a new upload: `<user_id>/<millis>-<uuid>.<ext>`.
pub fn object_key(user_id: &str, ext: &str) -> String {
    format!(
        "{}/{}-{}.{}",
        user_id,
        Utc::now().timestamp_millis(),
        Uuid::new_v4(),
        ext
    )
}

/// Store an uploaded image and attach it to the user's profile.
///
/// The object is removed again if the row cannot be written, e.g. when the
/// user already has the maximum number of photos.
pub async fn upload(
    db: &dyn Database,
    store: &dyn ObjectStore,
    user_id: &str,
    ext: &str,
    bytes: &[u8],
) -> Result<UserPhoto, PhotoError> {
    let ext = normalize_extension(ext).ok_or_else(|| PhotoError::UnsupportedType(ext.into()))?;
    if bytes.is_empty() {
        return Err(PhotoError::Empty);
    }
    if bytes.len() > rules::MAX_PHOTO_BYTES {
        return Err(PhotoError::TooLarge(rules::MAX_PHOTO_BYTES));
    }

    let key = object_key(user_id, &ext);
    let photo_url = store.upload(&key, bytes).await?;
    let photo = UserPhoto {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        photo_url,
        object_key: key.clone(),
        is_primary: false,
        created_at: Utc::now(),
    };

    match db.add_photo(&photo, rules::MAX_PHOTOS).await {
        Ok(stored) => {
            tracing::info!(user_id = %user_id, photo_id = %stored.id, primary = stored.is_primary, "Photo uploaded");
            Ok(stored)
        }
        Err(e) => {
            if let Err(cleanup) = store.delete(&key).await {
                tracing::warn!(key = %key, error = %cleanup, "Failed to remove orphaned object");
            }
            Err(e.into())
        }
    }
}

/// Delete a photo row and its object. Returns the removed photo.
pub async fn remove(
    db: &dyn Database,
    store: &dyn ObjectStore,
    user_id: &str,
    photo_id: &str,
) -> Result<UserPhoto, PhotoError> {
    let photo = db.delete_photo(user_id, photo_id).await?;
    // The row is gone either way; a stale object is only logged.
    if let Err(e) = store.delete(&photo.object_key).await {
        tracing::warn!(key = %photo.object_key, error = %e, "Failed to delete photo object");
    }
    tracing::info!(user_id = %user_id, photo_id = %photo_id, "Photo deleted");
    Ok(photo)
}
