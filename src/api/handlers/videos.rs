//! Lecture video handlers: presigned upload flow, catalog CRUD, thumbnails,
//! and playback resolution.

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Extension, Multipart, Path, Query, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::dto::{Pagination, PaginationQuery};
use crate::api::middleware::auth::{AuthExtension, UPLOAD_ROLES};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::video::{ThumbnailMethod, ThumbnailStatus, Video, VideoStatus};
use crate::services::video_service::{NewVideoUpload, VideoFilter, VideoPatch};

/// Client thumbnail images are small; reject anything over 5 MiB up front.
const MAX_THUMBNAIL_BYTES: usize = 5 * 1024 * 1024;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_videos).post(confirm_upload))
        .route("/upload-url", post(init_upload))
        .route(
            "/:id",
            get(get_video).patch(update_video).delete(delete_video),
        )
        .route("/:id/status", get(video_status))
        .route(
            "/:id/thumbnail",
            post(upload_thumbnail).layer(DefaultBodyLimit::max(MAX_THUMBNAIL_BYTES)),
        )
        .route("/:id/playback", get(playback))
        .route("/:id/content", get(content))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitUploadRequest {
    pub title: String,
    pub description: Option<String>,
    pub course_id: Option<Uuid>,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InitUploadResponse {
    pub video: VideoResponse,
    /// PUT the file body here, then call confirm
    pub upload_url: String,
    pub expires_in_secs: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmUploadRequest {
    /// Id handed out by the upload-url endpoint
    pub video_id: Uuid,
    /// Base64-encoded poster frame captured by the client, used as a
    /// thumbnail fallback when server-side capture fails
    pub thumbnail_data: Option<String>,
    /// Hand the video to the streaming provider for HLS delivery
    /// (default true when the provider is configured)
    pub ingest_to_mux: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateVideoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub course_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VideoResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub course_id: Option<Uuid>,
    pub uploaded_by: Option<Uuid>,
    pub content_type: String,
    pub size_bytes: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub status: VideoStatus,
    pub error_message: Option<String>,
    pub thumbnail_status: ThumbnailStatus,
    pub thumbnail_method: Option<ThumbnailMethod>,
    pub has_streaming: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Video> for VideoResponse {
    fn from(v: Video) -> Self {
        Self {
            id: v.id,
            title: v.title,
            description: v.description,
            course_id: v.course_id,
            uploaded_by: v.uploaded_by,
            content_type: v.content_type,
            size_bytes: v.size_bytes,
            duration_seconds: v.duration_seconds,
            status: v.status,
            error_message: v.error_message,
            thumbnail_status: v.thumbnail_status,
            thumbnail_method: v.thumbnail_method,
            has_streaming: v.mux_playback_id.is_some(),
            created_at: v.created_at,
            updated_at: v.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListVideosQuery {
    pub course_id: Option<Uuid>,
    pub status: Option<VideoStatus>,
    /// Substring match on title
    pub search: Option<String>,
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: PaginationQuery,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VideoListResponse {
    pub videos: Vec<VideoResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlaybackResponse {
    pub video_id: Uuid,
    pub status: VideoStatus,
    pub playback_url: String,
    pub poster_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<u64>,
}

/// Processing state a player polls while a video is in flight
#[derive(Debug, Serialize, ToSchema)]
pub struct VideoStatusResponse {
    pub video_id: Uuid,
    pub status: VideoStatus,
    pub thumbnail_status: ThumbnailStatus,
    pub thumbnail_method: Option<ThumbnailMethod>,
    pub has_streaming: bool,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
}

impl From<Video> for VideoStatusResponse {
    fn from(v: Video) -> Self {
        Self {
            video_id: v.id,
            status: v.status,
            thumbnail_status: v.thumbnail_status,
            thumbnail_method: v.thumbnail_method,
            has_streaming: v.mux_playback_id.is_some(),
            duration_seconds: v.duration_seconds,
            error_message: v.error_message,
        }
    }
}

/// List videos with optional course, status, and title filters.
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/videos",
    tag = "videos",
    params(ListVideosQuery),
    responses(
        (status = 200, description = "List of videos", body = VideoListResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn list_videos(
    State(state): State<SharedState>,
    Query(query): Query<ListVideosQuery>,
) -> Result<Json<VideoListResponse>> {
    let filter = VideoFilter {
        course_id: query.course_id,
        status: query.status,
        search: query.search.clone(),
        limit: query.pagination.limit(),
        offset: query.pagination.offset(),
    };

    let (videos, total) = state.videos.list(&filter).await?;

    Ok(Json(VideoListResponse {
        videos: videos.into_iter().map(Into::into).collect(),
        pagination: Pagination::from_query_and_total(&query.pagination, total),
    }))
}

/// Register an upload and receive a presigned PUT URL. The video stays
/// in `uploading` until the file is PUT and the catalog entry is
/// finalized with `POST /api/videos`.
#[utoipa::path(
    post,
    path = "/upload-url",
    context_path = "/api/videos",
    tag = "videos",
    request_body = InitUploadRequest,
    responses(
        (status = 200, description = "Presigned upload URL", body = InitUploadResponse),
        (status = 400, description = "Invalid metadata or backend cannot presign"),
        (status = 404, description = "Course not found")
    ),
    security(("bearer_auth" = []))
)]
async fn init_upload(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(req): Json<InitUploadRequest>,
) -> Result<Json<InitUploadResponse>> {
    auth.require_role(UPLOAD_ROLES)?;

    let (video, presigned) = state
        .videos
        .init_upload(
            NewVideoUpload {
                title: req.title,
                description: req.description,
                course_id: req.course_id,
                filename: req.filename,
                content_type: req.content_type,
                size_bytes: req.size_bytes,
            },
            auth.user_id,
            &auth.email,
        )
        .await?;

    Ok(Json(InitUploadResponse {
        video: video.into(),
        upload_url: presigned.url,
        expires_in_secs: presigned.expires_in.as_secs(),
    }))
}

/// Finalize an upload after the file landed in storage. Verifies the
/// object, runs thumbnail capture, and starts streaming ingest when
/// configured.
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/videos",
    tag = "videos",
    request_body = ConfirmUploadRequest,
    responses(
        (status = 201, description = "Catalog entry finalized", body = VideoResponse),
        (status = 400, description = "File not found in storage"),
        (status = 404, description = "Video not found"),
        (status = 409, description = "Video was already confirmed")
    ),
    security(("bearer_auth" = []))
)]
async fn confirm_upload(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(req): Json<ConfirmUploadRequest>,
) -> Result<(StatusCode, Json<VideoResponse>)> {
    auth.require_role(UPLOAD_ROLES)?;

    let client_thumbnail = match &req.thumbnail_data {
        Some(encoded) => Some(Bytes::from(BASE64.decode(encoded).map_err(|_| {
            AppError::Validation("thumbnail_data is not valid base64".to_string())
        })?)),
        None => None,
    };

    let ingest = req.ingest_to_mux.unwrap_or(true) && state.config.mux_enabled();

    let video = state
        .videos
        .confirm_upload(
            req.video_id,
            client_thumbnail,
            ingest,
            auth.user_id,
            &auth.email,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(video.into())))
}

/// Fetch a single video.
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/videos",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Video details", body = VideoResponse),
        (status = 404, description = "Video not found")
    ),
    security(("bearer_auth" = []))
)]
async fn get_video(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VideoResponse>> {
    let video = state.videos.get(id).await?;
    Ok(Json(video.into()))
}

/// Update title, description, or course linkage.
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/videos",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Video ID")),
    request_body = UpdateVideoRequest,
    responses(
        (status = 200, description = "Video updated", body = VideoResponse),
        (status = 404, description = "Video not found")
    ),
    security(("bearer_auth" = []))
)]
async fn update_video(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateVideoRequest>,
) -> Result<Json<VideoResponse>> {
    auth.require_role(UPLOAD_ROLES)?;

    let video = state
        .videos
        .update(
            id,
            VideoPatch {
                title: req.title,
                description: req.description,
                course_id: req.course_id,
            },
            auth.user_id,
            &auth.email,
        )
        .await?;

    Ok(Json(video.into()))
}

/// Delete a video, its stored file, its thumbnail, and its streaming asset.
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/videos",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Video ID")),
    responses(
        (status = 204, description = "Video deleted"),
        (status = 404, description = "Video not found")
    ),
    security(("bearer_auth" = []))
)]
async fn delete_video(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    auth.require_role(UPLOAD_ROLES)?;
    state.videos.delete(id, auth.user_id, &auth.email).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Live processing state. In-flight videos poll the streaming and
/// transcoding providers before answering, so a missed webhook does
/// not leave the player stuck on `processing`.
#[utoipa::path(
    get,
    path = "/{id}/status",
    context_path = "/api/videos",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Current processing state", body = VideoStatusResponse),
        (status = 404, description = "Video not found")
    ),
    security(("bearer_auth" = []))
)]
async fn video_status(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VideoStatusResponse>> {
    let video = state.videos.refresh(id).await?;
    Ok(Json(video.into()))
}

/// Regenerate a thumbnail. With a multipart `image` field the supplied
/// frame is stored directly; without one the capture chain runs again.
#[utoipa::path(
    post,
    path = "/{id}/thumbnail",
    context_path = "/api/videos",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Video ID")),
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Thumbnail updated", body = VideoResponse),
        (status = 400, description = "Malformed multipart body"),
        (status = 404, description = "Video not found")
    ),
    security(("bearer_auth" = []))
)]
async fn upload_thumbnail(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<VideoResponse>> {
    auth.require_role(UPLOAD_ROLES)?;

    let mut image: Option<Bytes> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some("image") {
            image = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("invalid image field: {}", e)))?,
            );
        }
    }

    let video = match image {
        Some(image) => {
            state
                .videos
                .set_client_thumbnail(id, image, auth.user_id, &auth.email)
                .await?
        }
        None => {
            state
                .videos
                .regenerate_thumbnail(id, auth.user_id, &auth.email)
                .await?
        }
    };

    Ok(Json(video.into()))
}

/// Resolve playback for a video: HLS when streamed, a presigned URL when
/// storage supports it, or the API content path.
#[utoipa::path(
    get,
    path = "/{id}/playback",
    context_path = "/api/videos",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Playback info", body = PlaybackResponse),
        (status = 404, description = "Video not found"),
        (status = 409, description = "Video is not ready")
    ),
    security(("bearer_auth" = []))
)]
async fn playback(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlaybackResponse>> {
    let info = state.videos.playback(id).await?;
    Ok(Json(PlaybackResponse {
        video_id: info.video_id,
        status: info.status,
        playback_url: info.playback_url,
        poster_url: info.poster_url,
        expires_in_secs: info.expires_in_secs,
    }))
}

/// Stream the raw video file through the API. Serves as the playback
/// path for backends without presigned URLs.
#[utoipa::path(
    get,
    path = "/{id}/content",
    context_path = "/api/videos",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Video bytes"),
        (status = 404, description = "Video not found")
    ),
    security(("bearer_auth" = []))
)]
async fn content(State(state): State<SharedState>, Path(id): Path<Uuid>) -> Result<Response> {
    let (video, data) = state.videos.content(id).await?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, video.content_type)
        .header(CONTENT_LENGTH, data.len())
        .header(CACHE_CONTROL, "private, max-age=3600")
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(format!("response build failed: {}", e)))?;

    Ok(response.into_response())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_videos,
        init_upload,
        confirm_upload,
        get_video,
        update_video,
        delete_video,
        video_status,
        upload_thumbnail,
        playback,
        content,
    ),
    components(schemas(
        InitUploadRequest,
        InitUploadResponse,
        ConfirmUploadRequest,
        UpdateVideoRequest,
        VideoResponse,
        VideoListResponse,
        PlaybackResponse,
        VideoStatusResponse,
    ))
)]
pub struct VideosApiDoc;
