//! Video catalog and upload pipeline.
//!
//! Uploads go straight from the browser to storage over a presigned
//! URL; the API only brokers URLs and records state. Confirmation
//! kicks off thumbnail generation and, when configured, Mux ingest.
//! Webhooks and the reconciler move rows out of `processing`.

use bytes::Bytes;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::video::{ThumbnailStatus, Video, VideoStatus};
use crate::services::audit_service::{AuditRecord, AuditService, EntityType};
use crate::services::metrics_service;
use crate::services::mux_client::{self, MuxAssetStatus, MuxClient, MuxWebhookEvent};
use crate::services::thumbnail_service::{ThumbnailContext, ThumbnailOutcome, ThumbnailService};
use crate::services::transcoder_client::{TranscodeJobEvent, TranscodeJobStatus, TranscoderClient};
use crate::storage::{video_storage_key, PresignedUrl, StorageBackend};

const VIDEO_COLUMNS: &str = "id, title, description, course_id, uploaded_by, storage_key, \
     content_type, size_bytes, duration_seconds, status, error_message, mux_asset_id, \
     mux_playback_id, mediaconvert_job_id, thumbnail_key, thumbnail_method, thumbnail_status, \
     created_at, updated_at";

/// Fields for a new upload registration
#[derive(Debug, Clone)]
pub struct NewVideoUpload {
    pub title: String,
    pub description: Option<String>,
    pub course_id: Option<Uuid>,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: Option<i64>,
}

/// Partial update; None leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct VideoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub course_id: Option<Uuid>,
}

/// List filters plus pagination
#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    pub course_id: Option<Uuid>,
    pub status: Option<VideoStatus>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Everything a player needs to start playback
#[derive(Debug, Clone)]
pub struct PlaybackInfo {
    pub video_id: Uuid,
    pub status: VideoStatus,
    pub playback_url: String,
    pub poster_url: Option<String>,
    /// None for non-expiring URLs (Mux, API streaming path)
    pub expires_in_secs: Option<u64>,
}

/// Reject obviously bad registrations before touching storage.
fn validate_new_upload(upload: &NewVideoUpload, max_upload_bytes: i64) -> Result<()> {
    if upload.title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".into()));
    }
    if !upload.content_type.starts_with("video/") {
        return Err(AppError::Validation(format!(
            "unsupported content type '{}'; expected video/*",
            upload.content_type
        )));
    }
    if let Some(size) = upload.size_bytes {
        if size <= 0 {
            return Err(AppError::Validation("size_bytes must be positive".into()));
        }
        if size > max_upload_bytes {
            return Err(AppError::Validation(format!(
                "file of {} bytes exceeds the {} byte upload limit",
                size, max_upload_bytes
            )));
        }
    }
    Ok(())
}

/// Video service
pub struct VideoService {
    db: PgPool,
    config: Arc<Config>,
    storage: Arc<dyn StorageBackend>,
    thumbnails: Arc<ThumbnailService>,
    mux: Option<Arc<MuxClient>>,
    transcoder: Option<Arc<TranscoderClient>>,
    audit: Arc<AuditService>,
}

impl VideoService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: PgPool,
        config: Arc<Config>,
        storage: Arc<dyn StorageBackend>,
        thumbnails: Arc<ThumbnailService>,
        mux: Option<Arc<MuxClient>>,
        transcoder: Option<Arc<TranscoderClient>>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            db,
            config,
            storage,
            thumbnails,
            mux,
            transcoder,
            audit,
        }
    }

    /// Register an upload and hand back a presigned PUT URL. The row
    /// stays in `uploading` until the client confirms.
    pub async fn init_upload(
        &self,
        upload: NewVideoUpload,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<(Video, PresignedUrl)> {
        validate_new_upload(&upload, self.config.max_upload_bytes as i64)?;

        if let Some(course_id) = upload.course_id {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM courses WHERE id = $1)",
            )
            .bind(course_id)
            .fetch_one(&self.db)
            .await?;
            if !exists {
                return Err(AppError::NotFound(format!("course {} not found", course_id)));
            }
        }

        let id = Uuid::new_v4();
        let storage_key = video_storage_key(id, &upload.filename);
        let expiry = Duration::from_secs(self.config.upload_url_expiry_secs);

        let presigned = self
            .storage
            .presign_upload(&storage_key, expiry)
            .await?
            .ok_or_else(|| {
                AppError::Validation(
                    "storage backend does not support direct uploads".to_string(),
                )
            })?;

        let video = sqlx::query_as::<_, Video>(&format!(
            "INSERT INTO videos (id, title, description, course_id, uploaded_by, storage_key, \
             content_type, size_bytes, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'uploading')
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(id)
        .bind(upload.title.trim())
        .bind(&upload.description)
        .bind(upload.course_id)
        .bind(actor_id)
        .bind(&storage_key)
        .bind(&upload.content_type)
        .bind(upload.size_bytes)
        .fetch_one(&self.db)
        .await?;

        self.audit
            .record(
                AuditRecord::new("video.created", EntityType::Video, id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({
                        "title": video.title,
                        "content_type": video.content_type,
                    })),
            )
            .await?;

        Ok((video, presigned))
    }

    /// Confirm that the client finished its PUT. Verifies the object,
    /// records its size, runs the thumbnail chain, and optionally
    /// starts Mux ingest.
    pub async fn confirm_upload(
        &self,
        id: Uuid,
        client_thumbnail: Option<Bytes>,
        ingest_to_mux: bool,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<Video> {
        let video = self.get(id).await?;
        if video.status != VideoStatus::Uploading {
            return Err(AppError::Conflict(format!(
                "video {} was already confirmed",
                id
            )));
        }

        if !self.storage.exists(&video.storage_key).await? {
            return Err(AppError::Validation(
                "no uploaded object found for this video; complete the upload first".to_string(),
            ));
        }

        let size_bytes = match self.storage.size(&video.storage_key).await {
            Ok(size) => Some(size as i64),
            Err(e) => {
                tracing::warn!("Could not stat uploaded object for {}: {}", id, e);
                video.size_bytes
            }
        };
        if let Some(size) = size_bytes {
            metrics_service::record_video_upload(&video.content_type, size as u64);
        }

        let ctx = ThumbnailContext {
            video: &video,
            client_image: client_thumbnail,
        };
        let thumbnail = self.thumbnails.generate(&ctx).await;

        let (status, mux_asset_id) = if ingest_to_mux {
            match self.start_mux_ingest(&video).await {
                Some(asset_id) => (VideoStatus::Processing, Some(asset_id)),
                None => (VideoStatus::Ready, None),
            }
        } else {
            (VideoStatus::Ready, None)
        };

        let video = sqlx::query_as::<_, Video>(&format!(
            "UPDATE videos SET size_bytes = $2, status = $3, mux_asset_id = $4, \
             thumbnail_key = $5, thumbnail_method = $6, thumbnail_status = $7, \
             mediaconvert_job_id = COALESCE($8, mediaconvert_job_id), updated_at = NOW()
             WHERE id = $1
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(id)
        .bind(size_bytes)
        .bind(status)
        .bind(&mux_asset_id)
        .bind(&thumbnail.key)
        .bind(thumbnail.method)
        .bind(thumbnail.status)
        .bind(&thumbnail.job_id)
        .fetch_one(&self.db)
        .await?;

        self.audit
            .record(
                AuditRecord::new("video.uploaded", EntityType::Video, id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({
                        "title": video.title,
                        "size_bytes": video.size_bytes,
                        "status": video.status.as_str(),
                    })),
            )
            .await?;

        Ok(video)
    }

    /// Hand the object to Mux by URL. Failures are logged and the
    /// video stays playable from storage.
    async fn start_mux_ingest(&self, video: &Video) -> Option<String> {
        let mux = self.mux.as_ref()?;

        let presigned = match self
            .storage
            .presign_download(
                &video.storage_key,
                Duration::from_secs(self.config.upload_url_expiry_secs),
            )
            .await
        {
            Ok(Some(presigned)) => presigned,
            Ok(None) => {
                tracing::warn!(
                    "Mux ingest requested for {} but storage cannot presign downloads",
                    video.id
                );
                return None;
            }
            Err(e) => {
                tracing::warn!("Could not presign {} for Mux ingest: {}", video.id, e);
                return None;
            }
        };

        match mux.create_asset(&presigned.url).await {
            Ok(asset) => {
                tracing::info!(video_id = %video.id, asset_id = %asset.id, "Started Mux ingest");
                Some(asset.id)
            }
            Err(e) => {
                tracing::warn!("Mux ingest failed for {}: {}", video.id, e);
                None
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Video> {
        sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("video {} not found", id)))
    }

    pub async fn list(&self, filter: &VideoFilter) -> Result<(Vec<Video>, i64)> {
        let videos = sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos
             WHERE ($1::uuid IS NULL OR course_id = $1)
               AND ($2::video_status IS NULL OR status = $2)
               AND ($3::text IS NULL OR title ILIKE '%' || $3 || '%')
             ORDER BY created_at DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(filter.course_id)
        .bind(filter.status)
        .bind(&filter.search)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM videos
             WHERE ($1::uuid IS NULL OR course_id = $1)
               AND ($2::video_status IS NULL OR status = $2)
               AND ($3::text IS NULL OR title ILIKE '%' || $3 || '%')",
        )
        .bind(filter.course_id)
        .bind(filter.status)
        .bind(&filter.search)
        .fetch_one(&self.db)
        .await?;

        Ok((videos, total))
    }

    pub async fn update(
        &self,
        id: Uuid,
        patch: VideoPatch,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<Video> {
        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(AppError::Validation("title must not be empty".into()));
            }
        }
        if let Some(course_id) = patch.course_id {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM courses WHERE id = $1)",
            )
            .bind(course_id)
            .fetch_one(&self.db)
            .await?;
            if !exists {
                return Err(AppError::NotFound(format!("course {} not found", course_id)));
            }
        }

        let video = sqlx::query_as::<_, Video>(&format!(
            "UPDATE videos SET title = COALESCE($2, title), \
             description = COALESCE($3, description), \
             course_id = COALESCE($4, course_id), updated_at = NOW()
             WHERE id = $1
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.title.as_deref().map(str::trim))
        .bind(&patch.description)
        .bind(patch.course_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("video {} not found", id)))?;

        self.audit
            .record(
                AuditRecord::new("video.updated", EntityType::Video, id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "title": video.title })),
            )
            .await?;

        Ok(video)
    }

    /// Remove the row, then clean up storage and Mux best-effort. A
    /// failed cleanup is logged, never surfaced; the catalog row is
    /// already gone.
    pub async fn delete(&self, id: Uuid, actor_id: Uuid, actor_email: &str) -> Result<()> {
        let video = self.get(id).await?;

        sqlx::query("DELETE FROM videos WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if let Err(e) = self.storage.delete(&video.storage_key).await {
            tracing::warn!("Could not delete stored object for {}: {}", id, e);
        }
        if let Some(thumbnail_key) = &video.thumbnail_key {
            // The placeholder is shared; only delete thumbnails owned
            // by this video.
            if thumbnail_key.starts_with("thumbnails/") {
                if let Err(e) = self.storage.delete(thumbnail_key).await {
                    tracing::warn!("Could not delete thumbnail for {}: {}", id, e);
                }
            }
        }
        if let (Some(mux), Some(asset_id)) = (&self.mux, &video.mux_asset_id) {
            if let Err(e) = mux.delete_asset(asset_id).await {
                tracing::warn!("Could not delete Mux asset {} for {}: {}", asset_id, id, e);
            }
        }

        self.audit
            .record(
                AuditRecord::new("video.deleted", EntityType::Video, id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "title": video.title })),
            )
            .await?;

        Ok(())
    }

    /// Store a replacement thumbnail supplied by the client.
    pub async fn set_client_thumbnail(
        &self,
        id: Uuid,
        image: Bytes,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<Video> {
        let video = self.get(id).await?;
        if image.is_empty() {
            return Err(AppError::Validation("thumbnail image is empty".into()));
        }

        let key = crate::storage::thumbnail_storage_key(video.id);
        self.storage.put(&key, image).await?;
        metrics_service::record_thumbnail_attempt("client", true);

        let video = sqlx::query_as::<_, Video>(&format!(
            "UPDATE videos SET thumbnail_key = $2, thumbnail_method = 'client', \
             thumbnail_status = 'ready', updated_at = NOW()
             WHERE id = $1
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(id)
        .bind(&key)
        .fetch_one(&self.db)
        .await?;

        self.audit
            .record(
                AuditRecord::new("video.thumbnail_updated", EntityType::Video, id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "method": "client" })),
            )
            .await?;

        Ok(video)
    }

    /// Re-run the thumbnail chain for an existing video. A job id
    /// already on the row keeps the transcoder strategy out of the
    /// pass; a newly submitted job records its id so the webhook can
    /// find the row later.
    pub async fn regenerate_thumbnail(
        &self,
        id: Uuid,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<Video> {
        let video = self.get(id).await?;

        let ctx = ThumbnailContext {
            video: &video,
            client_image: None,
        };
        let outcome = self.thumbnails.generate(&ctx).await;

        let video = sqlx::query_as::<_, Video>(&format!(
            "UPDATE videos SET thumbnail_key = $2, thumbnail_method = $3, \
             thumbnail_status = $4, mediaconvert_job_id = COALESCE($5, mediaconvert_job_id), \
             updated_at = NOW()
             WHERE id = $1
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(id)
        .bind(&outcome.key)
        .bind(outcome.method)
        .bind(outcome.status)
        .bind(&outcome.job_id)
        .fetch_one(&self.db)
        .await?;

        self.audit
            .record(
                AuditRecord::new("video.thumbnail_updated", EntityType::Video, id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "method": outcome.method.map(|m| m.as_str()) })),
            )
            .await?;

        Ok(video)
    }

    /// Resolve playback for a video: Mux HLS when ingested, a
    /// presigned download when the backend supports it, and the API
    /// streaming path otherwise.
    pub async fn playback(&self, id: Uuid) -> Result<PlaybackInfo> {
        let video = self.get(id).await?;

        if video.status != VideoStatus::Ready && video.mux_playback_id.is_none() {
            return Err(AppError::Conflict(format!(
                "video {} is not ready for playback (status: {})",
                id,
                video.status.as_str()
            )));
        }

        if let Some(playback_id) = &video.mux_playback_id {
            return Ok(PlaybackInfo {
                video_id: video.id,
                status: video.status,
                playback_url: mux_client::playback_url(playback_id),
                poster_url: Some(mux_client::poster_url(playback_id)),
                expires_in_secs: None,
            });
        }

        let expiry = Duration::from_secs(self.config.playback_url_expiry_secs);
        let poster_url = match &video.thumbnail_key {
            Some(key) => self
                .storage
                .presign_download(key, expiry)
                .await?
                .map(|p| p.url),
            None => None,
        };

        match self.storage.presign_download(&video.storage_key, expiry).await? {
            Some(presigned) => Ok(PlaybackInfo {
                video_id: video.id,
                status: video.status,
                playback_url: presigned.url,
                poster_url,
                expires_in_secs: Some(presigned.expires_in.as_secs()),
            }),
            None => Ok(PlaybackInfo {
                video_id: video.id,
                status: video.status,
                playback_url: format!("/api/videos/{}/content", video.id),
                poster_url,
                expires_in_secs: None,
            }),
        }
    }

    /// Raw object bytes for the API streaming path.
    pub async fn content(&self, id: Uuid) -> Result<(Video, Bytes)> {
        let video = self.get(id).await?;
        let content = self.storage.get(&video.storage_key).await?;
        Ok((video, content))
    }

    /// Apply a Mux webhook. Returns false when the event references no
    /// known video; unknown assets are acknowledged and ignored.
    pub async fn apply_mux_event(&self, event: &MuxWebhookEvent) -> Result<bool> {
        let Some(asset_id) = &event.asset_id else {
            return Ok(false);
        };

        let video = sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE mux_asset_id = $1"
        ))
        .bind(asset_id)
        .fetch_optional(&self.db)
        .await?;
        let Some(video) = video else {
            tracing::debug!("Mux event {} for unknown asset {}", event.event_type, asset_id);
            return Ok(false);
        };

        match event.event_type.as_str() {
            "video.asset.ready" => {
                sqlx::query(
                    "UPDATE videos SET status = 'ready', mux_playback_id = COALESCE($2, mux_playback_id), \
                     duration_seconds = COALESCE($3, duration_seconds), error_message = NULL, \
                     updated_at = NOW()
                     WHERE id = $1",
                )
                .bind(video.id)
                .bind(&event.playback_id)
                .bind(event.duration_seconds)
                .execute(&self.db)
                .await?;

                self.audit
                    .record(
                        AuditRecord::new("video.ready", EntityType::Video, video.id.to_string())
                            .payload(json!({ "mux_asset_id": asset_id })),
                    )
                    .await?;
                Ok(true)
            }
            "video.asset.errored" => {
                let message = if event.error_messages.is_empty() {
                    "Mux reported an ingest error".to_string()
                } else {
                    event.error_messages.join("; ")
                };
                sqlx::query(
                    "UPDATE videos SET status = 'errored', error_message = $2, updated_at = NOW()
                     WHERE id = $1",
                )
                .bind(video.id)
                .bind(&message)
                .execute(&self.db)
                .await?;

                self.audit
                    .record(
                        AuditRecord::new("video.errored", EntityType::Video, video.id.to_string())
                            .payload(json!({ "mux_asset_id": asset_id, "error": message })),
                    )
                    .await?;
                Ok(true)
            }
            "video.asset.deleted" => {
                sqlx::query(
                    "UPDATE videos SET mux_asset_id = NULL, mux_playback_id = NULL, \
                     updated_at = NOW()
                     WHERE id = $1",
                )
                .bind(video.id)
                .execute(&self.db)
                .await?;
                Ok(true)
            }
            other => {
                tracing::debug!("Ignoring Mux event type {}", other);
                Ok(false)
            }
        }
    }

    /// Apply a transcoder job notification. A failed job falls through
    /// to the rest of the thumbnail chain.
    pub async fn apply_transcode_event(&self, event: &TranscodeJobEvent) -> Result<bool> {
        let video = sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE mediaconvert_job_id = $1"
        ))
        .bind(&event.job_id)
        .fetch_optional(&self.db)
        .await?;
        let Some(video) = video else {
            tracing::debug!("Transcode event for unknown job {}", event.job_id);
            return Ok(false);
        };

        match event.status {
            TranscodeJobStatus::Complete => {
                sqlx::query(
                    "UPDATE videos SET thumbnail_status = 'ready', updated_at = NOW()
                     WHERE id = $1",
                )
                .bind(video.id)
                .execute(&self.db)
                .await?;
                metrics_service::record_thumbnail_attempt("transcoder", true);
                Ok(true)
            }
            TranscodeJobStatus::Error | TranscodeJobStatus::Canceled => {
                tracing::warn!(
                    video_id = %video.id,
                    job_id = %event.job_id,
                    "Transcoder job failed: {:?}; falling back",
                    event.error_message
                );
                metrics_service::record_thumbnail_attempt("transcoder", false);

                // The job id on the row keeps the transcoder strategy
                // out of this second pass.
                let ctx = ThumbnailContext {
                    video: &video,
                    client_image: None,
                };
                let outcome = self.thumbnails.generate(&ctx).await;
                self.persist_thumbnail_outcome(video.id, &outcome).await?;
                Ok(true)
            }
            TranscodeJobStatus::Submitted | TranscodeJobStatus::Progressing => Ok(true),
        }
    }

    async fn persist_thumbnail_outcome(&self, id: Uuid, outcome: &ThumbnailOutcome) -> Result<()> {
        sqlx::query(
            "UPDATE videos SET thumbnail_key = $2, thumbnail_method = $3, \
             thumbnail_status = $4, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&outcome.key)
        .bind(outcome.method)
        .bind(outcome.status)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Rows an external pipeline may still be working on.
    pub async fn list_in_flight(&self) -> Result<Vec<Video>> {
        Ok(sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos
             WHERE status = 'processing' OR thumbnail_status = 'processing'
             ORDER BY updated_at ASC
             LIMIT 100"
        ))
        .fetch_all(&self.db)
        .await?)
    }

    /// Current row state for the status endpoint a player polls while
    /// a video processes. In-flight rows poll upstream first, so a
    /// missed webhook does not strand the poller.
    pub async fn refresh(&self, id: Uuid) -> Result<Video> {
        let video = self.get(id).await?;
        if !video.in_flight() {
            return Ok(video);
        }
        self.reconcile(&video).await?;
        self.get(id).await
    }

    /// Poll upstream services for one in-flight video. Used by the
    /// reconciler when webhooks were missed.
    pub async fn reconcile(&self, video: &Video) -> Result<()> {
        if video.status == VideoStatus::Processing {
            if let (Some(mux), Some(asset_id)) = (&self.mux, &video.mux_asset_id) {
                match mux.get_asset(asset_id).await {
                    Ok(asset) => {
                        let synthetic = MuxWebhookEvent {
                            event_type: match asset.status {
                                MuxAssetStatus::Ready => "video.asset.ready".to_string(),
                                MuxAssetStatus::Errored => "video.asset.errored".to_string(),
                                MuxAssetStatus::Preparing => {
                                    return Ok(());
                                }
                            },
                            asset_id: Some(asset.id),
                            playback_id: asset.playback_id,
                            duration_seconds: asset.duration_seconds,
                            error_messages: Vec::new(),
                        };
                        self.apply_mux_event(&synthetic).await?;
                    }
                    Err(e) => {
                        tracing::warn!("Reconcile could not poll Mux asset {}: {}", asset_id, e);
                    }
                }
            }
        }

        if video.thumbnail_status == ThumbnailStatus::Processing {
            if let (Some(transcoder), Some(job_id)) =
                (&self.transcoder, &video.mediaconvert_job_id)
            {
                match transcoder.get_job(job_id).await {
                    Ok(job) if job.status.is_terminal() => {
                        let synthetic = TranscodeJobEvent {
                            job_id: job.id,
                            status: job.status,
                            error_message: job.error_message,
                        };
                        self.apply_transcode_event(&synthetic).await?;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Reconcile could not poll transcoder job {}: {}", job_id, e);
                    }
                }
            }
        }

        Ok(())
    }
}
