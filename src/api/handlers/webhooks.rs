//! Inbound webhook handlers for the streaming and transcoding providers.
//!
//! Both endpoints are unauthenticated at the session level; each carries
//! its own provider credential (an HMAC signature for Mux, a shared token
//! for MediaConvert). Events for unknown assets are acknowledged with
//! 200 so the provider stops retrying deliveries we will never match.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::services::metrics_service::record_webhook_received;
use crate::services::mux_client::{parse_webhook_event, verify_webhook_signature};
use crate::services::transcoder_client::parse_job_event;

/// Mux signs with a timestamp and allows five minutes of clock skew.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/mux", post(mux_webhook))
        .route("/mediaconvert", post(mediaconvert_webhook))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    /// False when the event did not match a known video
    pub handled: bool,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    token: Option<String>,
}

/// Receive Mux asset lifecycle events (`video.asset.ready`,
/// `video.asset.errored`, deletions).
#[utoipa::path(
    post,
    path = "/mux",
    context_path = "/api/webhooks",
    tag = "webhooks",
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 400, description = "Body is not valid JSON"),
        (status = 401, description = "Signature missing or invalid")
    )
)]
async fn mux_webhook(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    if let Some(secret) = &state.config.mux_webhook_secret {
        let signature = headers
            .get("Mux-Signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing Mux-Signature header".to_string()))?;

        let now = chrono::Utc::now().timestamp();
        if !verify_webhook_signature(secret, signature, &body, now, SIGNATURE_TOLERANCE_SECS) {
            record_webhook_received("mux", false);
            return Err(AppError::Authentication(
                "Invalid webhook signature".to_string(),
            ));
        }
    }

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|_| AppError::Validation("webhook body is not valid JSON".to_string()))?;

    let handled = match parse_webhook_event(&payload) {
        Some(event) => {
            tracing::debug!(event_type = %event.event_type, "Received Mux webhook");
            state.videos.apply_mux_event(&event).await?
        }
        None => {
            tracing::debug!("Ignoring Mux webhook without a type field");
            false
        }
    };

    record_webhook_received("mux", handled);
    Ok(Json(WebhookAck {
        received: true,
        handled,
    }))
}

/// Receive MediaConvert job state changes, either as the raw
/// EventBridge envelope or a flat payload.
#[utoipa::path(
    post,
    path = "/mediaconvert",
    context_path = "/api/webhooks",
    tag = "webhooks",
    params(("token" = Option<String>, Query, description = "Shared webhook token")),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 400, description = "Body is not valid JSON"),
        (status = 401, description = "Token missing or invalid")
    )
)]
async fn mediaconvert_webhook(
    State(state): State<SharedState>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    if let Some(expected) = &state.config.mediaconvert_webhook_token {
        let presented = query.token.clone().or_else(|| {
            headers
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_string)
        });

        if presented.as_deref() != Some(expected.as_str()) {
            record_webhook_received("mediaconvert", false);
            return Err(AppError::Authentication(
                "Invalid webhook token".to_string(),
            ));
        }
    }

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|_| AppError::Validation("webhook body is not valid JSON".to_string()))?;

    let handled = match parse_job_event(&payload) {
        Some(event) => {
            tracing::debug!(job_id = %event.job_id, status = ?event.status, "Received MediaConvert webhook");
            state.videos.apply_transcode_event(&event).await?
        }
        None => {
            tracing::debug!("Ignoring MediaConvert webhook without job fields");
            false
        }
    };

    record_webhook_received("mediaconvert", handled);
    Ok(Json(WebhookAck {
        received: true,
        handled,
    }))
}

#[derive(OpenApi)]
#[openapi(
    paths(mux_webhook, mediaconvert_webhook),
    components(schemas(WebhookAck))
)]
pub struct WebhooksApiDoc;
