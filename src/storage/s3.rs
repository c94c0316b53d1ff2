//! S3 storage backend using rust-s3 crate.
//!
//! Supports AWS S3 and S3-compatible services (MinIO, etc.).
//! Credentials come from the default chain: env vars, shared config
//! file, container credentials, instance metadata.

use async_trait::async_trait;
use bytes::Bytes;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use std::time::Duration;

use super::{validate_key, PresignedUrl, StorageBackend};
use crate::error::{AppError, Result};

/// S3 storage backend configuration
#[derive(Debug, Clone)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,
    /// AWS region
    pub region: String,
    /// Custom endpoint URL (for MinIO compatibility)
    pub endpoint: Option<String>,
}

impl S3Config {
    pub fn new(bucket: String, region: String, endpoint: Option<String>) -> Self {
        Self {
            bucket,
            region,
            endpoint,
        }
    }
}

/// S3-compatible storage backend
pub struct S3Storage {
    bucket: Box<Bucket>,
    /// Stored for rebuilding a bucket handle with refreshed credentials
    /// before presigning.
    bucket_name: String,
    region: Region,
    use_path_style: bool,
}

impl S3Storage {
    /// Create new S3 backend from configuration
    pub fn new(config: S3Config) -> Result<Self> {
        let credentials = Credentials::default()
            .map_err(|e| AppError::Config(format!("Failed to load AWS credentials: {}", e)))?;

        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse()
                .map_err(|_| AppError::Config(format!("Invalid S3 region: {}", config.region)))?,
        };

        // MinIO and friends want path-style addressing
        let use_path_style = config.endpoint.is_some();

        let bucket = Bucket::new(&config.bucket, region.clone(), credentials)
            .map_err(|e| AppError::Config(format!("Failed to create S3 bucket: {}", e)))?;
        let bucket = if use_path_style {
            bucket.with_path_style()
        } else {
            bucket
        };

        Ok(Self {
            bucket,
            bucket_name: config.bucket,
            region,
            use_path_style,
        })
    }

    /// Bucket handle with credentials refreshed from the default chain.
    /// STS/IRSA credentials rotate; signing with a stale set caps the
    /// URL lifetime at the remaining credential TTL. Falls back to the
    /// cached handle when the chain fails.
    fn signing_bucket(&self) -> Box<Bucket> {
        match Credentials::default() {
            Ok(fresh) => match Bucket::new(&self.bucket_name, self.region.clone(), fresh) {
                Ok(bucket) => {
                    if self.use_path_style {
                        bucket.with_path_style()
                    } else {
                        bucket
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to build fresh signing bucket, using cached credentials: {}",
                        e
                    );
                    self.bucket.clone()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to refresh credentials for presigning, using cached credentials: {}",
                    e
                );
                self.bucket.clone()
            }
        }
    }

    fn is_not_found(err: &s3::error::S3Error) -> bool {
        let err_str = err.to_string();
        err_str.contains("404") || err_str.contains("NoSuchKey") || err_str.contains("Not Found")
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    async fn put(&self, key: &str, content: Bytes) -> Result<()> {
        validate_key(key)?;
        self.bucket
            .put_object(key, &content)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to put object '{}': {}", key, e)))?;

        tracing::debug!(key = %key, "S3 put object successful");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        validate_key(key)?;
        let response = self.bucket.get_object(key).await.map_err(|e| {
            if Self::is_not_found(&e) {
                AppError::NotFound(format!("Storage key not found: {}", key))
            } else {
                AppError::Storage(format!("Failed to get object '{}': {}", key, e))
            }
        })?;

        tracing::debug!(key = %key, size = response.bytes().len(), "S3 get object successful");
        Ok(Bytes::from(response.to_vec()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        match self.bucket.head_object(key).await {
            Ok(_) => Ok(true),
            Err(e) if Self::is_not_found(&e) => Ok(false),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to check existence of '{}': {}",
                key, e
            ))),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.bucket
            .delete_object(key)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to delete object '{}': {}", key, e)))?;

        tracing::debug!(key = %key, "S3 delete object successful");
        Ok(())
    }

    async fn size(&self, key: &str) -> Result<u64> {
        validate_key(key)?;
        let (head, _) = self.bucket.head_object(key).await.map_err(|e| {
            if Self::is_not_found(&e) {
                AppError::NotFound(format!("Storage key not found: {}", key))
            } else {
                AppError::Storage(format!("Failed to get size of '{}': {}", key, e))
            }
        })?;

        Ok(head.content_length.unwrap_or(0) as u64)
    }

    fn supports_presigning(&self) -> bool {
        true
    }

    async fn presign_upload(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> Result<Option<PresignedUrl>> {
        validate_key(key)?;
        let expiry_secs = expires_in.as_secs().min(604800) as u32; // S3 caps at 7 days

        let url = self
            .signing_bucket()
            .presign_put(key, expiry_secs, None, None)
            .await
            .map_err(|e| {
                AppError::Storage(format!(
                    "Failed to generate upload URL for '{}': {}",
                    key, e
                ))
            })?;

        tracing::debug!(key = %key, expires_in_secs = expiry_secs, "Generated S3 upload URL");
        Ok(Some(PresignedUrl { url, expires_in }))
    }

    async fn presign_download(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> Result<Option<PresignedUrl>> {
        validate_key(key)?;
        let expiry_secs = expires_in.as_secs().min(604800) as u32;

        let url = self
            .signing_bucket()
            .presign_get(key, expiry_secs, None)
            .await
            .map_err(|e| {
                AppError::Storage(format!(
                    "Failed to generate presigned URL for '{}': {}",
                    key, e
                ))
            })?;

        tracing::debug!(key = %key, expires_in_secs = expiry_secs, "Generated S3 download URL");
        Ok(Some(PresignedUrl { url, expires_in }))
    }

    fn bucket_name(&self) -> Option<&str> {
        Some(&self.bucket_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_endpoint_forces_path_style() {
        let config = S3Config::new(
            "lectures".to_string(),
            "us-east-1".to_string(),
            Some("http://localhost:9000".to_string()),
        );
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:9000"));

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone().unwrap(),
        };
        assert_eq!(region.endpoint(), "http://localhost:9000");
    }

    #[test]
    fn well_known_region_parses() {
        let region: Region = "us-west-2".parse().unwrap();
        assert_eq!(region, Region::UsWest2);
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// Run with: S3_BUCKET=... AWS_REGION=... cargo test s3_round_trip -- --ignored --nocapture
    #[tokio::test]
    #[ignore] // Requires AWS credentials and a real bucket
    async fn s3_round_trip() {
        let bucket = match std::env::var("S3_BUCKET") {
            Ok(b) => b,
            Err(_) => {
                println!("Skipping: S3_BUCKET not set");
                return;
            }
        };
        let region = std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".into());

        let backend = S3Storage::new(S3Config::new(
            bucket,
            region,
            std::env::var("S3_ENDPOINT").ok(),
        ))
        .expect("Failed to create S3 backend");

        let key = format!("test/round-trip-{}.bin", uuid::Uuid::new_v4());
        let content = Bytes::from_static(b"lectern integration test");

        backend.put(&key, content.clone()).await.expect("put");
        assert!(backend.exists(&key).await.expect("exists"));
        assert_eq!(backend.get(&key).await.expect("get"), content);
        assert_eq!(backend.size(&key).await.expect("size"), content.len() as u64);

        let upload = backend
            .presign_upload(&key, Duration::from_secs(300))
            .await
            .expect("presign_upload")
            .expect("upload URL");
        assert!(upload.url.contains("X-Amz-Signature"));

        let download = backend
            .presign_download(&key, Duration::from_secs(300))
            .await
            .expect("presign_download")
            .expect("download URL");
        assert!(download.url.contains("X-Amz-Signature"));

        backend.delete(&key).await.expect("delete");
        assert!(!backend.exists(&key).await.expect("exists after delete"));
    }
}
