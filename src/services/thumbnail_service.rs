//! Thumbnail generation with ordered fallback.
//!
//! Strategies run in a fixed order until one succeeds: managed
//! transcoder job, local ffmpeg frame grab, client-supplied image,
//! static placeholder. A strategy failure is logged and the chain
//! moves on; the placeholder cannot fail, so every video ends up with
//! a thumbnail of some kind.

use async_trait::async_trait;
use bytes::Bytes;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::video::{ThumbnailMethod, ThumbnailStatus, Video};
use crate::services::metrics_service;
use crate::services::transcoder_client::{TranscoderClient, FRAME_CAPTURE_SUFFIX};
use crate::storage::{thumbnail_storage_key, StorageBackend};

/// What a strategy produced and how to record it on the video row
#[derive(Debug, Clone)]
pub struct ThumbnailOutcome {
    pub status: ThumbnailStatus,
    pub method: Option<ThumbnailMethod>,
    pub key: Option<String>,
    /// External job id when generation continues asynchronously
    pub job_id: Option<String>,
}

impl ThumbnailOutcome {
    fn ready(method: ThumbnailMethod, key: String) -> Self {
        Self {
            status: ThumbnailStatus::Ready,
            method: Some(method),
            key: Some(key),
            job_id: None,
        }
    }

    fn errored() -> Self {
        Self {
            status: ThumbnailStatus::Errored,
            method: None,
            key: None,
            job_id: None,
        }
    }
}

/// Inputs available to every strategy
pub struct ThumbnailContext<'a> {
    pub video: &'a Video,
    /// Frame the uploading client captured in the browser, if any
    pub client_image: Option<Bytes>,
}

/// One way of producing a thumbnail
#[async_trait]
pub trait ThumbnailStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap pre-check; inapplicable strategies are skipped without
    /// counting as failures.
    fn is_applicable(&self, ctx: &ThumbnailContext<'_>) -> bool;

    async fn attempt(&self, ctx: &ThumbnailContext<'_>) -> Result<ThumbnailOutcome>;
}

/// Submit a frame-capture job to the managed transcoder. Asynchronous;
/// the webhook or reconciler flips the row to ready when the frame
/// lands in the bucket.
struct TranscoderStrategy {
    client: Arc<TranscoderClient>,
    bucket: String,
}

#[async_trait]
impl ThumbnailStrategy for TranscoderStrategy {
    fn name(&self) -> &'static str {
        "transcoder"
    }

    fn is_applicable(&self, ctx: &ThumbnailContext<'_>) -> bool {
        // A job id on the row means a capture was already submitted;
        // a second pass goes straight to the fallbacks.
        ctx.video.content_type.starts_with("video/")
            && ctx.video.mediaconvert_job_id.is_none()
    }

    async fn attempt(&self, ctx: &ThumbnailContext<'_>) -> Result<ThumbnailOutcome> {
        let input = format!("s3://{}/{}", self.bucket, ctx.video.storage_key);
        let destination = format!("s3://{}/thumbnails/{}", self.bucket, ctx.video.id);
        let job = self.client.create_frame_capture_job(&input, &destination).await?;

        tracing::info!(
            video_id = %ctx.video.id,
            job_id = %job.id,
            "Submitted transcoder frame-capture job"
        );
        Ok(ThumbnailOutcome {
            status: ThumbnailStatus::Processing,
            method: Some(ThumbnailMethod::Transcoder),
            key: Some(format!("thumbnails/{}{}", ctx.video.id, FRAME_CAPTURE_SUFFIX)),
            job_id: Some(job.id),
        })
    }
}

/// Grab a frame with a local ffmpeg binary and store it ourselves.
struct FfmpegStrategy {
    storage: Arc<dyn StorageBackend>,
    ffmpeg_path: String,
}

impl FfmpegStrategy {
    /// ffmpeg reads https inputs natively, so presigning backends
    /// stream straight from the store. Only the filesystem backend
    /// round-trips through a temp file.
    async fn resolve_input(&self, video: &Video) -> Result<(String, Option<std::path::PathBuf>)> {
        if let Some(presigned) = self
            .storage
            .presign_download(&video.storage_key, std::time::Duration::from_secs(900))
            .await?
        {
            return Ok((presigned.url, None));
        }

        let content = self.storage.get(&video.storage_key).await?;
        let path = std::env::temp_dir().join(format!("lectern-{}-source", video.id));
        tokio::fs::write(&path, &content).await?;
        Ok((path.to_string_lossy().into_owned(), Some(path)))
    }
}

#[async_trait]
impl ThumbnailStrategy for FfmpegStrategy {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn is_applicable(&self, ctx: &ThumbnailContext<'_>) -> bool {
        ctx.video.content_type.starts_with("video/")
    }

    async fn attempt(&self, ctx: &ThumbnailContext<'_>) -> Result<ThumbnailOutcome> {
        let (input, temp_source) = self.resolve_input(ctx.video).await?;
        let output_path = std::env::temp_dir().join(format!("lectern-{}-thumb.jpg", ctx.video.id));

        let run = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-ss")
            .arg("00:00:01")
            .arg("-i")
            .arg(&input)
            .arg("-frames:v")
            .arg("1")
            .arg("-vf")
            .arg("scale='min(1280,iw)':-2")
            .arg("-q:v")
            .arg("3")
            .arg("-f")
            .arg("image2")
            .arg(&output_path)
            .stdin(Stdio::null())
            .output()
            .await;

        if let Some(path) = temp_source {
            let _ = tokio::fs::remove_file(path).await;
        }

        let output = run?;
        if !output.status.success() {
            let _ = tokio::fs::remove_file(&output_path).await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(3)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("; ");
            return Err(AppError::Internal(format!(
                "ffmpeg exited with {}: {}",
                output.status, tail
            )));
        }

        let image = tokio::fs::read(&output_path).await?;
        let _ = tokio::fs::remove_file(&output_path).await;

        let key = thumbnail_storage_key(ctx.video.id);
        self.storage.put(&key, Bytes::from(image)).await?;
        Ok(ThumbnailOutcome::ready(ThumbnailMethod::Ffmpeg, key))
    }
}

/// Store a frame the uploading client captured in the browser.
struct ClientImageStrategy {
    storage: Arc<dyn StorageBackend>,
}

#[async_trait]
impl ThumbnailStrategy for ClientImageStrategy {
    fn name(&self) -> &'static str {
        "client"
    }

    fn is_applicable(&self, ctx: &ThumbnailContext<'_>) -> bool {
        ctx.client_image.is_some()
    }

    async fn attempt(&self, ctx: &ThumbnailContext<'_>) -> Result<ThumbnailOutcome> {
        let image = ctx
            .client_image
            .clone()
            .ok_or_else(|| AppError::Internal("client image strategy ran without an image".into()))?;
        if image.is_empty() {
            return Err(AppError::Validation("client thumbnail is empty".into()));
        }

        let key = thumbnail_storage_key(ctx.video.id);
        self.storage.put(&key, image).await?;
        Ok(ThumbnailOutcome::ready(ThumbnailMethod::Client, key))
    }
}

/// Point at the shared placeholder asset. Last in the chain and
/// cannot fail.
struct PlaceholderStrategy {
    placeholder_key: String,
}

#[async_trait]
impl ThumbnailStrategy for PlaceholderStrategy {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn is_applicable(&self, _ctx: &ThumbnailContext<'_>) -> bool {
        true
    }

    async fn attempt(&self, _ctx: &ThumbnailContext<'_>) -> Result<ThumbnailOutcome> {
        Ok(ThumbnailOutcome::ready(
            ThumbnailMethod::Placeholder,
            self.placeholder_key.clone(),
        ))
    }
}

/// Runs the strategy chain
pub struct ThumbnailService {
    strategies: Vec<Box<dyn ThumbnailStrategy>>,
}

impl ThumbnailService {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        transcoder: Option<Arc<TranscoderClient>>,
        config: &Config,
    ) -> Self {
        let mut strategies: Vec<Box<dyn ThumbnailStrategy>> = Vec::new();

        if let Some(client) = transcoder {
            if let Some(bucket) = storage.bucket_name() {
                strategies.push(Box::new(TranscoderStrategy {
                    client,
                    bucket: bucket.to_string(),
                }));
            } else {
                tracing::debug!(
                    "Transcoder configured but storage backend has no bucket; skipping strategy"
                );
            }
        }

        strategies.push(Box::new(FfmpegStrategy {
            storage: Arc::clone(&storage),
            ffmpeg_path: config.ffmpeg_path.clone(),
        }));
        strategies.push(Box::new(ClientImageStrategy {
            storage: Arc::clone(&storage),
        }));
        strategies.push(Box::new(PlaceholderStrategy {
            placeholder_key: config.placeholder_thumbnail_key.clone(),
        }));

        Self { strategies }
    }

    #[cfg(test)]
    fn with_strategies(strategies: Vec<Box<dyn ThumbnailStrategy>>) -> Self {
        Self { strategies }
    }

    /// Walk the chain until a strategy succeeds. Failures are logged
    /// and swallowed so a broken ffmpeg install or an unreachable
    /// transcoder never blocks an upload.
    pub async fn generate(&self, ctx: &ThumbnailContext<'_>) -> ThumbnailOutcome {
        for strategy in &self.strategies {
            if !strategy.is_applicable(ctx) {
                tracing::debug!(
                    video_id = %ctx.video.id,
                    strategy = strategy.name(),
                    "Thumbnail strategy not applicable, skipping"
                );
                continue;
            }

            match strategy.attempt(ctx).await {
                Ok(outcome) => {
                    metrics_service::record_thumbnail_attempt(strategy.name(), true);
                    tracing::info!(
                        video_id = %ctx.video.id,
                        strategy = strategy.name(),
                        status = ?outcome.status,
                        "Thumbnail strategy succeeded"
                    );
                    return outcome;
                }
                Err(e) => {
                    metrics_service::record_thumbnail_attempt(strategy.name(), false);
                    tracing::warn!(
                        video_id = %ctx.video.id,
                        strategy = strategy.name(),
                        "Thumbnail strategy failed: {}, trying next",
                        e
                    );
                }
            }
        }

        tracing::error!(video_id = %ctx.video.id, "All thumbnail strategies failed");
        ThumbnailOutcome::errored()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::video::VideoStatus;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct ScriptedStrategy {
        name: &'static str,
        applicable: bool,
        succeed: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ThumbnailStrategy for ScriptedStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_applicable(&self, _ctx: &ThumbnailContext<'_>) -> bool {
            self.applicable
        }

        async fn attempt(&self, _ctx: &ThumbnailContext<'_>) -> Result<ThumbnailOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(ThumbnailOutcome::ready(
                    ThumbnailMethod::Client,
                    format!("thumbnails/{}.jpg", self.name),
                ))
            } else {
                Err(AppError::Internal("scripted failure".into()))
            }
        }
    }

    fn scripted(
        name: &'static str,
        applicable: bool,
        succeed: bool,
    ) -> (Box<dyn ThumbnailStrategy>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let strategy = ScriptedStrategy {
            name,
            applicable,
            succeed,
            calls: Arc::clone(&calls),
        };
        (Box::new(strategy), calls)
    }

    fn test_video() -> Video {
        Video {
            id: Uuid::new_v4(),
            title: "Torts, Week 1".into(),
            description: None,
            course_id: None,
            uploaded_by: None,
            storage_key: "videos/x/week1.mp4".into(),
            content_type: "video/mp4".into(),
            size_bytes: Some(2048),
            duration_seconds: None,
            status: VideoStatus::Ready,
            error_message: None,
            mux_asset_id: None,
            mux_playback_id: None,
            mediaconvert_job_id: None,
            thumbnail_key: None,
            thumbnail_method: None,
            thumbnail_status: ThumbnailStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn chain_stops_at_first_success() {
        let (first, first_calls) = scripted("first", true, true);
        let (second, second_calls) = scripted("second", true, true);
        let service = ThumbnailService::with_strategies(vec![first, second]);

        let video = test_video();
        let ctx = ThumbnailContext {
            video: &video,
            client_image: None,
        };
        let outcome = service.generate(&ctx).await;

        assert_eq!(outcome.status, ThumbnailStatus::Ready);
        assert_eq!(outcome.key.as_deref(), Some("thumbnails/first.jpg"));
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn chain_continues_past_failures() {
        let (first, first_calls) = scripted("first", true, false);
        let (second, second_calls) = scripted("second", true, false);
        let (third, third_calls) = scripted("third", true, true);
        let service = ThumbnailService::with_strategies(vec![first, second, third]);

        let video = test_video();
        let ctx = ThumbnailContext {
            video: &video,
            client_image: None,
        };
        let outcome = service.generate(&ctx).await;

        assert_eq!(outcome.status, ThumbnailStatus::Ready);
        assert_eq!(outcome.key.as_deref(), Some("thumbnails/third.jpg"));
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_eq!(third_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn inapplicable_strategies_are_skipped_without_attempt() {
        let (skipped, skipped_calls) = scripted("skipped", false, true);
        let (used, used_calls) = scripted("used", true, true);
        let service = ThumbnailService::with_strategies(vec![skipped, used]);

        let video = test_video();
        let ctx = ThumbnailContext {
            video: &video,
            client_image: None,
        };
        let outcome = service.generate(&ctx).await;

        assert_eq!(outcome.key.as_deref(), Some("thumbnails/used.jpg"));
        assert_eq!(skipped_calls.load(Ordering::SeqCst), 0);
        assert_eq!(used_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_reports_errored() {
        let (only, _) = scripted("only", true, false);
        let service = ThumbnailService::with_strategies(vec![only]);

        let video = test_video();
        let ctx = ThumbnailContext {
            video: &video,
            client_image: None,
        };
        let outcome = service.generate(&ctx).await;

        assert_eq!(outcome.status, ThumbnailStatus::Errored);
        assert!(outcome.key.is_none());
        assert!(outcome.method.is_none());
    }

    #[tokio::test]
    async fn default_chain_ends_with_placeholder() {
        let placeholder = PlaceholderStrategy {
            placeholder_key: "static/video-placeholder.jpg".into(),
        };
        let video = test_video();
        let ctx = ThumbnailContext {
            video: &video,
            client_image: None,
        };

        assert!(placeholder.is_applicable(&ctx));
        let outcome = placeholder.attempt(&ctx).await.unwrap();
        assert_eq!(outcome.status, ThumbnailStatus::Ready);
        assert_eq!(outcome.method, Some(ThumbnailMethod::Placeholder));
        assert_eq!(outcome.key.as_deref(), Some("static/video-placeholder.jpg"));
    }
}
