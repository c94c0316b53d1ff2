//! Application configuration loaded from environment variables.

use crate::error::{AppError, Result};
use std::env;

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Server bind address (host:port)
    pub bind_address: String,

    /// Log level
    pub log_level: String,

    /// Maximum database connections in the pool
    pub db_max_connections: u32,

    /// Storage backend: "filesystem" or "s3"
    pub storage_backend: String,

    /// Filesystem storage path (when storage_backend = "filesystem")
    pub storage_path: String,

    /// S3 bucket name (when storage_backend = "s3")
    pub s3_bucket: Option<String>,

    /// S3 region
    pub s3_region: Option<String>,

    /// S3 endpoint URL (for MinIO or other S3-compatible services)
    pub s3_endpoint: Option<String>,

    /// Expiry for presigned upload URLs, in seconds
    pub upload_url_expiry_secs: u32,

    /// Expiry for presigned playback/download URLs, in seconds
    pub playback_url_expiry_secs: u32,

    /// Maximum accepted size for a single video upload, in bytes
    pub max_upload_bytes: u64,

    /// JWT secret key for signing tokens
    pub jwt_secret: String,

    /// JWT access token expiry in minutes
    pub jwt_access_token_expiry_minutes: i64,

    /// JWT refresh token expiry in days
    pub jwt_refresh_token_expiry_days: i64,

    /// Initial admin account email
    pub admin_email: String,

    /// Initial admin account password (generated when unset)
    pub admin_password: Option<String>,

    /// Streaming provider API token id (optional)
    pub mux_token_id: Option<String>,

    /// Streaming provider API token secret (optional)
    pub mux_token_secret: Option<String>,

    /// Streaming provider webhook signing secret (optional)
    pub mux_webhook_secret: Option<String>,

    /// Transcoder account endpoint, e.g. https://abcd1234.mediaconvert.us-east-1.amazonaws.com
    /// (optional; discovered from the control plane at startup when unset)
    pub mediaconvert_endpoint: Option<String>,

    /// IAM role the transcoder assumes for bucket access (optional)
    pub mediaconvert_role_arn: Option<String>,

    /// Transcoder queue ARN (optional, account default queue when unset)
    pub mediaconvert_queue: Option<String>,

    /// Shared token expected on transcoder webhook callbacks (optional)
    pub mediaconvert_webhook_token: Option<String>,

    /// AWS region used for request signing
    pub aws_region: Option<String>,

    /// AWS access key id for request signing
    pub aws_access_key_id: Option<String>,

    /// AWS secret access key for request signing
    pub aws_secret_access_key: Option<String>,

    /// Path to the ffmpeg binary used for local frame capture
    pub ffmpeg_path: String,

    /// Storage key of the bundled placeholder thumbnail
    pub placeholder_thumbnail_key: String,

    /// Seconds between background reconciliation sweeps of processing videos
    pub reconcile_interval_secs: u64,
}

redacted_debug!(Config {
    redact database_url,
    show bind_address,
    show log_level,
    show db_max_connections,
    show storage_backend,
    show storage_path,
    show s3_bucket,
    show s3_region,
    show s3_endpoint,
    show upload_url_expiry_secs,
    show playback_url_expiry_secs,
    show max_upload_bytes,
    redact jwt_secret,
    show jwt_access_token_expiry_minutes,
    show jwt_refresh_token_expiry_days,
    show admin_email,
    redact_option admin_password,
    show mux_token_id,
    redact_option mux_token_secret,
    redact_option mux_webhook_secret,
    show mediaconvert_endpoint,
    show mediaconvert_role_arn,
    show mediaconvert_queue,
    redact_option mediaconvert_webhook_token,
    show aws_region,
    show aws_access_key_id,
    redact_option aws_secret_access_key,
    show ffmpeg_path,
    show placeholder_thumbnail_key,
    show reconcile_interval_secs,
});

fn parse_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| AppError::Config("DATABASE_URL not set".into()))?,
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 20),
            storage_backend: env::var("STORAGE_BACKEND").unwrap_or_else(|_| "filesystem".into()),
            storage_path: env::var("STORAGE_PATH")
                .unwrap_or_else(|_| "/var/lib/lectern/media".into()),
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            upload_url_expiry_secs: parse_or("UPLOAD_URL_EXPIRY_SECS", 3600),
            playback_url_expiry_secs: parse_or("PLAYBACK_URL_EXPIRY_SECS", 900),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 5 * 1024 * 1024 * 1024),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| AppError::Config("JWT_SECRET not set".into()))?,
            jwt_access_token_expiry_minutes: parse_or("JWT_ACCESS_TOKEN_EXPIRY_MINUTES", 30),
            jwt_refresh_token_expiry_days: parse_or("JWT_REFRESH_TOKEN_EXPIRY_DAYS", 7),
            admin_email: env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@lectern.local".into()),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            mux_token_id: env::var("MUX_TOKEN_ID").ok(),
            mux_token_secret: env::var("MUX_TOKEN_SECRET").ok(),
            mux_webhook_secret: env::var("MUX_WEBHOOK_SECRET").ok(),
            mediaconvert_endpoint: env::var("MEDIACONVERT_ENDPOINT").ok(),
            mediaconvert_role_arn: env::var("MEDIACONVERT_ROLE_ARN").ok(),
            mediaconvert_queue: env::var("MEDIACONVERT_QUEUE").ok(),
            mediaconvert_webhook_token: env::var("MEDIACONVERT_WEBHOOK_TOKEN").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            aws_access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
            aws_secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".into()),
            placeholder_thumbnail_key: env::var("PLACEHOLDER_THUMBNAIL_KEY")
                .unwrap_or_else(|_| "static/video-placeholder.jpg".into()),
            reconcile_interval_secs: parse_or("RECONCILE_INTERVAL_SECS", 300),
        })
    }

    /// True when both streaming provider API tokens are present.
    pub fn mux_enabled(&self) -> bool {
        self.mux_token_id.is_some() && self.mux_token_secret.is_some()
    }

    /// True when the transcoder role and signing credentials are present.
    /// The account endpoint is not required; it is discovered at startup
    /// when unset.
    pub fn mediaconvert_enabled(&self) -> bool {
        self.mediaconvert_role_arn.is_some()
            && self.aws_region.is_some()
            && self.aws_access_key_id.is_some()
            && self.aws_secret_access_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_on_garbage() {
        assert_eq!(parse_or("LECTERN_TEST_UNSET_VAR", 42u32), 42);
    }

    fn base_config() -> Config {
        Config {
            database_url: "postgres://localhost/lectern".into(),
            bind_address: "127.0.0.1:8080".into(),
            log_level: "info".into(),
            db_max_connections: 20,
            storage_backend: "filesystem".into(),
            storage_path: "/tmp/lectern".into(),
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            upload_url_expiry_secs: 3600,
            playback_url_expiry_secs: 900,
            max_upload_bytes: 1024,
            jwt_secret: "secret".into(),
            jwt_access_token_expiry_minutes: 30,
            jwt_refresh_token_expiry_days: 7,
            admin_email: "admin@lectern.local".into(),
            admin_password: None,
            mux_token_id: None,
            mux_token_secret: None,
            mux_webhook_secret: None,
            mediaconvert_endpoint: None,
            mediaconvert_role_arn: None,
            mediaconvert_queue: None,
            mediaconvert_webhook_token: None,
            aws_region: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            ffmpeg_path: "ffmpeg".into(),
            placeholder_thumbnail_key: "static/video-placeholder.jpg".into(),
            reconcile_interval_secs: 300,
        }
    }

    #[test]
    fn mux_requires_both_tokens() {
        let mut config = base_config();
        assert!(!config.mux_enabled());
        config.mux_token_id = Some("id".into());
        assert!(!config.mux_enabled());
        config.mux_token_secret = Some("secret".into());
        assert!(config.mux_enabled());
    }

    #[test]
    fn mediaconvert_requires_role_and_credentials() {
        let mut config = base_config();
        assert!(!config.mediaconvert_enabled());
        // An endpoint alone is not enough to submit jobs
        config.mediaconvert_endpoint = Some("https://abcd.mediaconvert.us-east-1.amazonaws.com".into());
        assert!(!config.mediaconvert_enabled());
        config.mediaconvert_role_arn = Some("arn:aws:iam::123456789012:role/transcode".into());
        config.aws_region = Some("us-east-1".into());
        config.aws_access_key_id = Some("AKIAEXAMPLE".into());
        assert!(!config.mediaconvert_enabled());
        config.aws_secret_access_key = Some("secret".into());
        assert!(config.mediaconvert_enabled());

        // The endpoint itself stays optional; discovery fills it in
        config.mediaconvert_endpoint = None;
        assert!(config.mediaconvert_enabled());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = base_config();
        config.mux_token_secret = Some("mux-secret-value".into());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("mux-secret-value"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(rendered.contains("127.0.0.1:8080"));
    }
}
