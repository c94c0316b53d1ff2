//! Storage backends for video content and thumbnails.

pub mod filesystem;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Result of a presigned URL request
#[derive(Debug, Clone)]
pub struct PresignedUrl {
    /// The presigned URL for direct access
    pub url: String,
    /// When the URL expires
    pub expires_in: Duration,
}

/// Storage backend trait
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store content at the given key
    async fn put(&self, key: &str, content: Bytes) -> Result<()>;

    /// Retrieve content by key
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete content by key
    async fn delete(&self, key: &str) -> Result<()>;

    /// Content size in bytes without fetching the body
    async fn size(&self, key: &str) -> Result<u64>;

    /// Check if this backend can hand out presigned URLs for direct
    /// client access
    fn supports_presigning(&self) -> bool {
        false
    }

    /// Presigned URL for a direct client upload (PUT), if supported.
    async fn presign_upload(&self, key: &str, expires_in: Duration) -> Result<Option<PresignedUrl>> {
        let _ = (key, expires_in);
        Ok(None)
    }

    /// Presigned URL for a direct client download (GET), if supported.
    async fn presign_download(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> Result<Option<PresignedUrl>> {
        let _ = (key, expires_in);
        Ok(None)
    }

    /// Bucket identity for backends that expose one. Used when handing
    /// destinations to the external transcoder.
    fn bucket_name(&self) -> Option<&str> {
        None
    }
}

/// Keep the client-supplied filename recognizable but safe as a key
/// segment. Anything outside [A-Za-z0-9._-] becomes an underscore.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches(['.', '_']).to_string();
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed
    }
}

/// Storage key for an uploaded video, namespaced by video id.
pub fn video_storage_key(video_id: Uuid, filename: &str) -> String {
    format!("videos/{}/{}", video_id, sanitize_filename(filename))
}

/// Storage key for a generated thumbnail.
pub fn thumbnail_storage_key(video_id: Uuid) -> String {
    format!("thumbnails/{}.jpg", video_id)
}

/// Validate a key before it touches a backend: no empty keys, no
/// absolute paths, no parent-directory traversal.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(AppError::Validation("storage key must not be empty".into()));
    }
    if key.starts_with('/') {
        return Err(AppError::Validation(
            "storage key must be relative".to_string(),
        ));
    }
    if key.split('/').any(|segment| segment == "..") {
        return Err(AppError::Validation(format!(
            "storage key '{}' contains parent traversal",
            key
        )));
    }
    Ok(())
}
