//! Filesystem storage backend.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::{validate_key, StorageBackend};
use crate::error::{AppError, Result};

/// Filesystem-based storage backend. Keys map directly to paths under
/// the base directory, so `videos/{id}/file.mp4` lands where it reads.
pub struct FilesystemStorage {
    base_path: PathBuf,
}

impl FilesystemStorage {
    /// Create new filesystem storage
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn key_to_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl StorageBackend for FilesystemStorage {
    async fn put(&self, key: &str, content: Bytes) -> Result<()> {
        let path = self.key_to_path(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a sibling temp file, then rename. Readers never see a
        // partially written object.
        let tmp_path = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&content).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp_path, &path).await?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = self.key_to_path(key)?;
        match fs::read(&path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("Storage key not found: {}", key)))
            }
            Err(e) => Err(AppError::Storage(format!("Failed to read {}: {}", key, e))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.key_to_path(key)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to delete {}: {}", key, e)))?;
        Ok(())
    }

    async fn size(&self, key: &str) -> Result<u64> {
        let path = self.key_to_path(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("Storage key not found: {}", key)))
            }
            Err(e) => Err(AppError::Storage(format!(
                "Failed to stat {}: {}",
                key, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backend() -> (TempDir, FilesystemStorage) {
        let dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(dir.path());
        (dir, storage)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let (_dir, storage) = backend();
        let content = Bytes::from_static(b"frame data");

        storage.put("videos/abc/lecture.mp4", content.clone()).await.unwrap();
        let fetched = storage.get("videos/abc/lecture.mp4").await.unwrap();
        assert_eq!(fetched, content);
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let (_dir, storage) = backend();
        let err = storage.get("videos/missing.mp4").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn exists_and_delete() {
        let (_dir, storage) = backend();
        storage.put("thumbnails/x.jpg", Bytes::from_static(b"jpg")).await.unwrap();

        assert!(storage.exists("thumbnails/x.jpg").await.unwrap());
        storage.delete("thumbnails/x.jpg").await.unwrap();
        assert!(!storage.exists("thumbnails/x.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn size_reports_content_length() {
        let (_dir, storage) = backend();
        storage.put("videos/a/b.mp4", Bytes::from_static(b"12345")).await.unwrap();
        assert_eq!(storage.size("videos/a/b.mp4").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let (_dir, storage) = backend();
        let err = storage
            .put("videos/../../escape", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn overwrite_replaces_content() {
        let (_dir, storage) = backend();
        storage.put("k/v.bin", Bytes::from_static(b"old")).await.unwrap();
        storage.put("k/v.bin", Bytes::from_static(b"new")).await.unwrap();
        assert_eq!(storage.get("k/v.bin").await.unwrap(), Bytes::from_static(b"new"));
    }

    #[test]
    fn presigning_unsupported() {
        let (_dir, storage) = backend();
        assert!(!storage.supports_presigning());
    }
}
