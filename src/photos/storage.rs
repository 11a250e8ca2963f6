//! Object storage for uploaded photos.
//!
//! Objects live under a root directory on disk and are addressed by
//! relative keys such as `<user_id>/<millis>-<uuid>.jpg`. Public URLs are
//! `<public_url>/photos/<key>`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use url::Url;

use crate::error::StorageError;

/// Extensions accepted for uploads.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "heic"];

/// Upload/fetch/delete of opaque objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` and return its public URL.
    async fn upload(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError>;

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove an object. Missing objects are not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Filesystem-backed object store.
pub struct LocalObjectStore {
    root: PathBuf,
    public_base: Url,
}

impl LocalObjectStore {
    pub fn new(root: PathBuf, public_base: Url) -> Self {
        Self { root, public_base }
    }

    /// Ensure the root directory exists.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Resolve a key to a path, refusing anything that escapes the root.
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let clean = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/photos/{}",
            self.public_base.as_str().trim_end_matches('/'),
            key
        )
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        tracing::debug!(key = %key, size = bytes.len(), "Object stored");
        Ok(self.public_url(key))
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Normalize and check an upload extension.
pub fn normalize_extension(ext: &str) -> Option<String> {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Content type served for a stored key.
pub fn content_type_for(key: &str) -> &'static str {
    match Path::new(key)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> LocalObjectStore {
        LocalObjectStore::new(
            dir.to_path_buf(),
            Url::parse("https://pass.example.org/").unwrap(),
        )
    }

    #[tokio::test]
    async fn upload_read_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());

        let url = store.upload("u1/1.jpg", b"jpeg-bytes").await.unwrap();
        assert_eq!(url, "https://pass.example.org/photos/u1/1.jpg");
        assert_eq!(store.read("u1/1.jpg").await.unwrap(), b"jpeg-bytes");

        store.delete("u1/1.jpg").await.unwrap();
        assert!(matches!(
            store.read("u1/1.jpg").await,
            Err(StorageError::NotFound(_))
        ));
        // Deleting twice is fine.
        store.delete("u1/1.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_escaping_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        for key in ["../secret", "/etc/passwd", "u1/../../x", ""] {
            assert!(
                matches!(store.upload(key, b"x").await, Err(StorageError::InvalidKey(_))),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn extensions() {
        assert_eq!(normalize_extension(".JPG").as_deref(), Some("jpg"));
        assert_eq!(normalize_extension("png").as_deref(), Some("png"));
        assert!(normalize_extension("exe").is_none());
        assert_eq!(content_type_for("u1/a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("u1/a.bin"), "application/octet-stream");
    }
}
