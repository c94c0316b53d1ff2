//! Client for the Mux Video API.
//!
//! Covers asset ingest, status lookup, deletion, and webhook signature
//! verification. Asset state changes arrive over webhooks; the client
//! only polls as a fallback during reconciliation.

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::services::metrics_service;

const API_BASE: &str = "https://api.mux.com";

type HmacSha256 = Hmac<Sha256>;

/// Errors from the Mux API
#[derive(Error, Debug)]
pub enum MuxError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Asset {0} not found")]
    AssetNotFound(String),
}

impl From<MuxError> for crate::error::AppError {
    fn from(e: MuxError) -> Self {
        match e {
            MuxError::AssetNotFound(id) => {
                crate::error::AppError::NotFound(format!("Mux asset {} not found", id))
            }
            other => crate::error::AppError::Upstream(format!("mux: {}", other)),
        }
    }
}

/// Lifecycle states Mux reports for an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxAssetStatus {
    Preparing,
    Ready,
    Errored,
}

impl MuxAssetStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "preparing" => Some(Self::Preparing),
            "ready" => Some(Self::Ready),
            "errored" => Some(Self::Errored),
            _ => None,
        }
    }
}

/// A Mux asset, reduced to the fields the catalog tracks
#[derive(Debug, Clone)]
pub struct MuxAsset {
    pub id: String,
    pub status: MuxAssetStatus,
    pub playback_id: Option<String>,
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AssetEnvelope {
    data: AssetBody,
}

#[derive(Debug, Deserialize)]
struct AssetBody {
    id: String,
    status: String,
    #[serde(default)]
    playback_ids: Vec<PlaybackId>,
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PlaybackId {
    id: String,
}

impl AssetBody {
    fn into_asset(self) -> MuxAsset {
        let status = MuxAssetStatus::parse(&self.status).unwrap_or(MuxAssetStatus::Preparing);
        MuxAsset {
            id: self.id,
            status,
            playback_id: self.playback_ids.into_iter().next().map(|p| p.id),
            duration_seconds: self.duration,
        }
    }
}

/// HLS playback URL for a public playback ID.
pub fn playback_url(playback_id: &str) -> String {
    format!("https://stream.mux.com/{}.m3u8", playback_id)
}

/// Poster frame URL served by Mux's image service.
pub fn poster_url(playback_id: &str) -> String {
    format!("https://image.mux.com/{}/thumbnail.jpg", playback_id)
}

/// Webhook notification, reduced to the fields the pipeline acts on
#[derive(Debug, Clone)]
pub struct MuxWebhookEvent {
    pub event_type: String,
    pub asset_id: Option<String>,
    pub playback_id: Option<String>,
    pub duration_seconds: Option<f64>,
    pub error_messages: Vec<String>,
}

pub fn parse_webhook_event(payload: &serde_json::Value) -> Option<MuxWebhookEvent> {
    let event_type = payload.get("type")?.as_str()?.to_string();
    let data = payload.get("data");
    let asset_id = data
        .and_then(|d| d.get("id"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let playback_id = data
        .and_then(|d| d.get("playback_ids"))
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("id"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let duration_seconds = data.and_then(|d| d.get("duration")).and_then(|v| v.as_f64());
    let error_messages = data
        .and_then(|d| d.get("errors"))
        .and_then(|e| e.get("messages"))
        .and_then(|m| m.as_array())
        .map(|msgs| {
            msgs.iter()
                .filter_map(|m| m.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Some(MuxWebhookEvent {
        event_type,
        asset_id,
        playback_id,
        duration_seconds,
        error_messages,
    })
}

/// Verify a `Mux-Signature` header (`t=<unix>,v1=<hex hmac>`) against
/// the raw request body. The signed payload is `{t}.{body}`. Rejects
/// timestamps outside `tolerance_secs` to blunt replay.
pub fn verify_webhook_signature(
    secret: &str,
    signature_header: &str,
    body: &[u8],
    now_unix: i64,
    tolerance_secs: i64,
) -> bool {
    let mut timestamp: Option<i64> = None;
    let mut provided: Option<Vec<u8>> = None;

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => provided = hex::decode(value).ok(),
            _ => {}
        }
    }

    let (Some(timestamp), Some(provided)) = (timestamp, provided) else {
        return false;
    };
    if (now_unix - timestamp).abs() > tolerance_secs {
        return false;
    }

    // HMAC accepts keys of any length, so new_from_slice cannot fail here
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

/// Sign a webhook body the way Mux does. Test helper for exercising
/// the verification path without recorded fixtures.
#[cfg(test)]
pub fn sign_webhook_body(secret: &str, body: &[u8], timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    format!("t={},v1={}", timestamp, hex::encode(digest))
}

/// Mux REST client
pub struct MuxClient {
    client: Client,
    token_id: String,
    token_secret: String,
    base_url: String,
}

impl MuxClient {
    pub fn new(token_id: String, token_secret: String) -> Result<Self, MuxError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            token_id,
            token_secret,
            base_url: API_BASE.to_string(),
        })
    }

    /// Ingest a video from a URL. Mux pulls the source asynchronously;
    /// readiness arrives over the webhook.
    pub async fn create_asset(&self, input_url: &str) -> Result<MuxAsset, MuxError> {
        let body = json!({
            "input": [{ "url": input_url }],
            "playback_policy": ["public"],
            "video_quality": "basic"
        });

        let url = format!("{}/video/v1/assets", self.base_url);
        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.token_id, Some(&self.token_secret))
            .json(&body)
            .send()
            .await;
        self.finish::<AssetEnvelope>("create_asset", started, response)
            .await
            .map(|envelope| envelope.data.into_asset())
    }

    pub async fn get_asset(&self, asset_id: &str) -> Result<MuxAsset, MuxError> {
        let url = format!("{}/video/v1/assets/{}", self.base_url, asset_id);
        let started = Instant::now();
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.token_id, Some(&self.token_secret))
            .send()
            .await;
        match self
            .finish::<AssetEnvelope>("get_asset", started, response)
            .await
        {
            Ok(envelope) => Ok(envelope.data.into_asset()),
            Err(MuxError::Api { status: 404, .. }) => {
                Err(MuxError::AssetNotFound(asset_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Delete an asset. Missing assets are treated as already deleted.
    pub async fn delete_asset(&self, asset_id: &str) -> Result<(), MuxError> {
        let url = format!("{}/video/v1/assets/{}", self.base_url, asset_id);
        let started = Instant::now();
        let response = self
            .client
            .delete(&url)
            .basic_auth(&self.token_id, Some(&self.token_secret))
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                metrics_service::record_upstream_call(
                    "mux",
                    status.is_success() || status.as_u16() == 404,
                    started.elapsed().as_secs_f64(),
                );
                if status.is_success() || status.as_u16() == 404 {
                    Ok(())
                } else {
                    let message = resp.text().await.unwrap_or_default();
                    Err(MuxError::Api {
                        status: status.as_u16(),
                        message,
                    })
                }
            }
            Err(e) => {
                metrics_service::record_upstream_call("mux", false, started.elapsed().as_secs_f64());
                Err(MuxError::Http(e))
            }
        }
    }

    async fn finish<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        started: Instant,
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<T, MuxError> {
        match response {
            Ok(resp) => {
                let status = resp.status();
                metrics_service::record_upstream_call(
                    "mux",
                    status.is_success(),
                    started.elapsed().as_secs_f64(),
                );
                if !status.is_success() {
                    let message = resp.text().await.unwrap_or_default();
                    tracing::warn!("Mux {} failed: {} {}", operation, status, message);
                    return Err(MuxError::Api {
                        status: status.as_u16(),
                        message,
                    });
                }
                Ok(resp.json::<T>().await?)
            }
            Err(e) => {
                metrics_service::record_upstream_call("mux", false, started.elapsed().as_secs_f64());
                Err(MuxError::Http(e))
            }
        }
    }
}
