//! Video lecture model and pipeline state enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Upload lifecycle state mirroring the `video_status` Postgres type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "video_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Uploading,
    Processing,
    Ready,
    Errored,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Uploading => "uploading",
            VideoStatus::Processing => "processing",
            VideoStatus::Ready => "ready",
            VideoStatus::Errored => "errored",
        }
    }
}

/// Thumbnail pipeline state mirroring the `thumbnail_status` Postgres type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "thumbnail_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailStatus {
    Pending,
    Processing,
    Ready,
    Errored,
}

/// Which strategy produced the stored thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "thumbnail_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailMethod {
    Transcoder,
    Ffmpeg,
    Client,
    Placeholder,
}

impl ThumbnailMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThumbnailMethod::Transcoder => "transcoder",
            ThumbnailMethod::Ffmpeg => "ffmpeg",
            ThumbnailMethod::Client => "client",
            ThumbnailMethod::Placeholder => "placeholder",
        }
    }
}

/// Video entity
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub course_id: Option<Uuid>,
    pub uploaded_by: Option<Uuid>,
    pub storage_key: String,
    pub content_type: String,
    pub size_bytes: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub status: VideoStatus,
    pub error_message: Option<String>,
    pub mux_asset_id: Option<String>,
    pub mux_playback_id: Option<String>,
    pub mediaconvert_job_id: Option<String>,
    pub thumbnail_key: Option<String>,
    pub thumbnail_method: Option<ThumbnailMethod>,
    pub thumbnail_status: ThumbnailStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// True while an external pipeline may still mutate this row.
    pub fn in_flight(&self) -> bool {
        self.status == VideoStatus::Processing
            || self.thumbnail_status == ThumbnailStatus::Processing
    }
}
