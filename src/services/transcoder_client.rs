//! Client for the managed video transcoder's REST control plane
//! (AWS Elemental MediaConvert wire format).
//!
//! Only the operations the thumbnail pipeline needs: discover the
//! account endpoint, submit a frame-capture job, and poll job status.
//! Requests are signed with SigV4.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

use crate::services::aws_sign::{sign_request, SigningCredentials};
use crate::services::metrics_service;

const API_VERSION: &str = "2017-08-29";

/// Suffix the transcoder appends to single-frame captures.
pub const FRAME_CAPTURE_SUFFIX: &str = ".0000000.jpg";

/// Errors from the transcoder control plane
#[derive(Error, Debug)]
pub enum TranscoderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Job {0} not found")]
    JobNotFound(String),
}

impl From<TranscoderError> for crate::error::AppError {
    fn from(e: TranscoderError) -> Self {
        crate::error::AppError::Upstream(format!("transcoder: {}", e))
    }
}

/// Retry configuration for exponential backoff
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Transcoder client configuration
#[derive(Clone)]
pub struct TranscoderConfig {
    /// Account endpoint, e.g. https://abcd1234.mediaconvert.us-east-1.amazonaws.com
    pub endpoint: String,
    /// Signing region
    pub region: String,
    /// IAM role the service assumes for bucket access
    pub role_arn: String,
    /// Queue ARN; account default queue when None
    pub queue: Option<String>,
    /// Signing credentials
    pub credentials: SigningCredentials,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retry configuration for transient failures
    pub retry: RetryConfig,
}

redacted_debug!(TranscoderConfig {
    show endpoint,
    show region,
    show role_arn,
    show queue,
    show timeout_secs,
});

/// Lifecycle states a transcoder job reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeJobStatus {
    Submitted,
    Progressing,
    Complete,
    Error,
    Canceled,
}

impl TranscodeJobStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SUBMITTED" => Some(Self::Submitted),
            "PROGRESSING" => Some(Self::Progressing),
            "COMPLETE" => Some(Self::Complete),
            "ERROR" => Some(Self::Error),
            "CANCELED" => Some(Self::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Canceled)
    }
}

/// A transcoder job as reported by the API
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub id: String,
    pub status: TranscodeJobStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobEnvelope {
    job: JobBody,
}

#[derive(Debug, Deserialize)]
struct JobBody {
    id: String,
    status: String,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

impl JobBody {
    fn into_job(self) -> TranscodeJob {
        let status =
            TranscodeJobStatus::parse(&self.status).unwrap_or(TranscodeJobStatus::Progressing);
        TranscodeJob {
            id: self.id,
            status,
            error_message: self.error_message,
        }
    }
}

/// Job completion notification delivered over the webhook. Accepts both
/// the EventBridge envelope and a flat payload.
#[derive(Debug, Clone)]
pub struct TranscodeJobEvent {
    pub job_id: String,
    pub status: TranscodeJobStatus,
    pub error_message: Option<String>,
}

pub fn parse_job_event(payload: &serde_json::Value) -> Option<TranscodeJobEvent> {
    let detail = payload.get("detail").unwrap_or(payload);
    let job_id = detail.get("jobId")?.as_str()?.to_string();
    let status = TranscodeJobStatus::parse(detail.get("status")?.as_str()?)?;
    let error_message = detail
        .get("errorMessage")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    Some(TranscodeJobEvent {
        job_id,
        status,
        error_message,
    })
}

/// Build the job settings body for a single-frame thumbnail capture.
/// `input` and `destination` are s3:// URIs; the capture lands at
/// `{destination}{FRAME_CAPTURE_SUFFIX}`.
pub fn frame_capture_job_body(
    role_arn: &str,
    queue: Option<&str>,
    input: &str,
    destination: &str,
) -> serde_json::Value {
    let mut body = json!({
        "role": role_arn,
        "clientRequestToken": Uuid::new_v4().to_string(),
        "settings": {
            "inputs": [{
                "fileInput": input,
                "timecodeSource": "ZEROBASED",
                "videoSelector": {},
                "audioSelectors": {}
            }],
            "outputGroups": [{
                "name": "Thumbnail",
                "outputGroupSettings": {
                    "type": "FILE_GROUP_SETTINGS",
                    "fileGroupSettings": { "destination": destination }
                },
                "outputs": [{
                    "extension": "jpg",
                    "containerSettings": { "container": "RAW" },
                    "videoDescription": {
                        "width": 1280,
                        "codecSettings": {
                            "codec": "FRAME_CAPTURE",
                            "frameCaptureSettings": {
                                "framerateNumerator": 1,
                                "framerateDenominator": 5,
                                "maxCaptures": 1,
                                "quality": 80
                            }
                        }
                    }
                }]
            }]
        }
    });
    if let Some(queue) = queue {
        body["queue"] = json!(queue);
    }
    body
}

#[derive(Debug, Deserialize)]
struct EndpointsEnvelope {
    endpoints: Vec<EndpointBody>,
}

#[derive(Debug, Deserialize)]
struct EndpointBody {
    url: String,
}

/// Discover the account-specific endpoint by calling DescribeEndpoints
/// on the regional control plane. Run once at startup when no endpoint
/// is configured; job calls must go to the account endpoint.
pub async fn discover_endpoint(
    region: &str,
    credentials: &SigningCredentials,
) -> Result<String, TranscoderError> {
    let host = format!("mediaconvert.{}.amazonaws.com", region);
    let path = format!("/{}/endpoints", API_VERSION);
    let payload = b"{}";

    let signed = sign_request(
        "POST",
        &host,
        &path,
        "application/json",
        payload,
        region,
        "mediaconvert",
        credentials,
        chrono::Utc::now(),
    );

    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    let response = client
        .post(format!("https://{}{}", host, path))
        .header("Content-Type", "application/json")
        .header("X-Amz-Date", signed.amz_date)
        .header("Authorization", signed.authorization)
        .body(payload.to_vec())
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(TranscoderError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let envelope: EndpointsEnvelope = response.json().await?;
    match envelope.endpoints.into_iter().next() {
        Some(endpoint) => Ok(endpoint.url),
        None => Err(TranscoderError::Api {
            status: status.as_u16(),
            message: "DescribeEndpoints returned no endpoints".to_string(),
        }),
    }
}

/// Strip the scheme and any path from an endpoint URL, leaving the
/// host for SigV4 header signing.
fn endpoint_host(endpoint: &str) -> String {
    let stripped = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint);
    stripped
        .split('/')
        .next()
        .unwrap_or(stripped)
        .to_string()
}

/// Transcoder REST client
pub struct TranscoderClient {
    client: Client,
    config: TranscoderConfig,
    host: String,
}

impl TranscoderClient {
    pub fn new(config: TranscoderConfig) -> Result<Self, TranscoderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let host = endpoint_host(&config.endpoint);

        Ok(Self {
            client,
            config,
            host,
        })
    }

    /// Submit a frame-capture job. Returns the accepted job.
    pub async fn create_frame_capture_job(
        &self,
        input: &str,
        destination: &str,
    ) -> Result<TranscodeJob, TranscoderError> {
        let body = frame_capture_job_body(
            &self.config.role_arn,
            self.config.queue.as_deref(),
            input,
            destination,
        );
        let path = format!("/{}/jobs", API_VERSION);
        let envelope: JobEnvelope = self.send("POST", &path, Some(&body)).await?;
        Ok(envelope.job.into_job())
    }

    /// Fetch the current state of a job.
    pub async fn get_job(&self, job_id: &str) -> Result<TranscodeJob, TranscoderError> {
        let path = format!("/{}/jobs/{}", API_VERSION, job_id);
        match self.send::<JobEnvelope>("GET", &path, None).await {
            Ok(envelope) => Ok(envelope.job.into_job()),
            Err(TranscoderError::Api { status: 404, .. }) => {
                Err(TranscoderError::JobNotFound(job_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Signed request with retry on transient failures.
    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, TranscoderError> {
        let payload = match body {
            Some(value) => serde_json::to_vec(value)?,
            None => Vec::new(),
        };

        let retry = &self.config.retry;
        let mut attempt = 0;
        let mut delay_ms = retry.initial_delay_ms;

        loop {
            let started = Instant::now();
            let result = self.send_once(method, path, &payload).await;

            match result {
                Ok(response) => {
                    let status = response.status();

                    if (status.is_server_error() || status.as_u16() == 429)
                        && attempt < retry.max_retries
                    {
                        tracing::warn!(
                            "Transcoder returned {}, retrying in {}ms (attempt {}/{})",
                            status,
                            delay_ms,
                            attempt + 1,
                            retry.max_retries
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        attempt += 1;
                        delay_ms = std::cmp::min(
                            (delay_ms as f64 * retry.backoff_multiplier) as u64,
                            retry.max_delay_ms,
                        );
                        continue;
                    }

                    metrics_service::record_upstream_call(
                        "transcoder",
                        status.is_success(),
                        started.elapsed().as_secs_f64(),
                    );

                    if !status.is_success() {
                        let message = response.text().await.unwrap_or_default();
                        return Err(TranscoderError::Api {
                            status: status.as_u16(),
                            message,
                        });
                    }

                    return Ok(response.json::<T>().await?);
                }
                Err(e) => {
                    if (e.is_connect() || e.is_timeout()) && attempt < retry.max_retries {
                        tracing::warn!(
                            "Transcoder network error: {}, retrying in {}ms (attempt {}/{})",
                            e,
                            delay_ms,
                            attempt + 1,
                            retry.max_retries
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        attempt += 1;
                        delay_ms = std::cmp::min(
                            (delay_ms as f64 * retry.backoff_multiplier) as u64,
                            retry.max_delay_ms,
                        );
                        continue;
                    }
                    metrics_service::record_upstream_call(
                        "transcoder",
                        false,
                        started.elapsed().as_secs_f64(),
                    );
                    return Err(TranscoderError::Http(e));
                }
            }
        }
    }

    async fn send_once(
        &self,
        method: &str,
        path: &str,
        payload: &[u8],
    ) -> Result<reqwest::Response, reqwest::Error> {
        let signed = sign_request(
            method,
            &self.host,
            path,
            "application/json",
            payload,
            &self.config.region,
            "mediaconvert",
            &self.config.credentials,
            chrono::Utc::now(),
        );

        let url = format!("{}{}", self.config.endpoint.trim_end_matches('/'), path);
        let request = match method {
            "POST" => self.client.post(&url).body(payload.to_vec()),
            _ => self.client.get(&url),
        };

        request
            .header("Content-Type", "application/json")
            .header("X-Amz-Date", signed.amz_date)
            .header("Authorization", signed.authorization)
            .send()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_host_strips_scheme_and_path() {
        assert_eq!(
            endpoint_host("https://abcd1234.mediaconvert.us-east-1.amazonaws.com"),
            "abcd1234.mediaconvert.us-east-1.amazonaws.com"
        );
        assert_eq!(
            endpoint_host("https://abcd1234.mediaconvert.us-east-1.amazonaws.com/"),
            "abcd1234.mediaconvert.us-east-1.amazonaws.com"
        );
        assert_eq!(endpoint_host("http://localhost:8081/extra"), "localhost:8081");
    }

    #[test]
    fn endpoints_envelope_deserializes() {
        let raw = serde_json::json!({
            "endpoints": [
                { "url": "https://abcd1234.mediaconvert.us-east-1.amazonaws.com" }
            ]
        });
        let envelope: EndpointsEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(
            envelope.endpoints[0].url,
            "https://abcd1234.mediaconvert.us-east-1.amazonaws.com"
        );
    }

    #[test]
    fn job_status_parses_wire_values() {
        assert_eq!(
            TranscodeJobStatus::parse("COMPLETE"),
            Some(TranscodeJobStatus::Complete)
        );
        assert_eq!(
            TranscodeJobStatus::parse("PROGRESSING"),
            Some(TranscodeJobStatus::Progressing)
        );
        assert_eq!(TranscodeJobStatus::parse("unknown"), None);
        assert!(TranscodeJobStatus::Complete.is_terminal());
        assert!(!TranscodeJobStatus::Submitted.is_terminal());
    }

    #[test]
    fn frame_capture_body_carries_role_input_and_destination() {
        let body = frame_capture_job_body(
            "arn:aws:iam::123456789012:role/transcode",
            None,
            "s3://lectures/videos/abc/intro.mp4",
            "s3://lectures/thumbnails/abc",
        );

        assert_eq!(body["role"], "arn:aws:iam::123456789012:role/transcode");
        assert_eq!(
            body["settings"]["inputs"][0]["fileInput"],
            "s3://lectures/videos/abc/intro.mp4"
        );
        assert_eq!(
            body["settings"]["outputGroups"][0]["outputGroupSettings"]["fileGroupSettings"]
                ["destination"],
            "s3://lectures/thumbnails/abc"
        );
        let codec = &body["settings"]["outputGroups"][0]["outputs"][0]["videoDescription"]
            ["codecSettings"];
        assert_eq!(codec["codec"], "FRAME_CAPTURE");
        assert_eq!(codec["frameCaptureSettings"]["maxCaptures"], 1);
        assert!(body.get("queue").is_none());
    }

    #[test]
    fn frame_capture_body_includes_queue_when_set() {
        let body = frame_capture_job_body(
            "arn:role",
            Some("arn:aws:mediaconvert:us-east-1:123456789012:queues/Default"),
            "s3://b/in.mp4",
            "s3://b/out",
        );
        assert_eq!(
            body["queue"],
            "arn:aws:mediaconvert:us-east-1:123456789012:queues/Default"
        );
    }

    #[test]
    fn job_event_parses_eventbridge_envelope() {
        let payload = serde_json::json!({
            "version": "0",
            "detail-type": "MediaConvert Job State Change",
            "detail": {
                "jobId": "1671234567890-abc123",
                "status": "COMPLETE"
            }
        });
        let event = parse_job_event(&payload).unwrap();
        assert_eq!(event.job_id, "1671234567890-abc123");
        assert_eq!(event.status, TranscodeJobStatus::Complete);
        assert!(event.error_message.is_none());
    }

    #[test]
    fn job_event_parses_flat_payload_with_error() {
        let payload = serde_json::json!({
            "jobId": "job-9",
            "status": "ERROR",
            "errorMessage": "input unreadable"
        });
        let event = parse_job_event(&payload).unwrap();
        assert_eq!(event.status, TranscodeJobStatus::Error);
        assert_eq!(event.error_message.as_deref(), Some("input unreadable"));
    }

    #[test]
    fn job_event_rejects_malformed_payloads() {
        assert!(parse_job_event(&serde_json::json!({})).is_none());
        assert!(parse_job_event(&serde_json::json!({"detail": {"jobId": "x"}})).is_none());
        assert!(
            parse_job_event(&serde_json::json!({"jobId": "x", "status": "NOT_A_STATUS"})).is_none()
        );
    }
}
