//! Health check endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::api::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: CheckStatus,
    pub storage: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming: Option<CheckStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcoder: Option<CheckStatus>,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckStatus {
    fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            message: None,
        }
    }

    fn unhealthy(message: String) -> Self {
        Self {
            status: "unhealthy".to_string(),
            message: Some(message),
        }
    }

    fn configured() -> Self {
        Self {
            status: "configured".to_string(),
            message: None,
        }
    }
}

/// Health check endpoint. Database connectivity decides the overall status;
/// the upstream providers only authenticate on real calls, so they are
/// reported as configured or absent rather than pinged.
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    let db_check = match sqlx::query("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => CheckStatus::healthy(),
        Err(e) => CheckStatus::unhealthy(format!("Database connection failed: {}", e)),
    };

    let storage_check = match state
        .storage
        .exists(&state.config.placeholder_thumbnail_key)
        .await
    {
        Ok(true) => CheckStatus::healthy(),
        Ok(false) => CheckStatus::unhealthy("placeholder thumbnail missing".to_string()),
        Err(e) => CheckStatus::unhealthy(format!("Storage check failed: {}", e)),
    };

    let streaming_check = state.config.mux_enabled().then(CheckStatus::configured);
    let transcoder_check = state
        .config
        .mediaconvert_enabled()
        .then(CheckStatus::configured);

    let overall_status = if db_check.status == "healthy" {
        "healthy"
    } else {
        "unhealthy"
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database: db_check,
            storage: storage_check,
            streaming: streaming_check,
            transcoder: transcoder_check,
        },
    };

    let status_code = if overall_status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

/// Readiness check endpoint. Is the service ready to accept traffic?
pub async fn readiness_check(State(state): State<SharedState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Liveness check endpoint. Process is up.
pub async fn liveness_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Prometheus metrics endpoint, rendered from the recorder installed at startup.
pub async fn metrics(State(state): State<SharedState>) -> impl IntoResponse {
    match &state.metrics_handle {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; charset=utf-8")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_checks_are_skipped_when_absent() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "1.0.0".to_string(),
            checks: HealthChecks {
                database: CheckStatus::healthy(),
                storage: CheckStatus::healthy(),
                streaming: None,
                transcoder: None,
            },
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"database\""));
        assert!(!json.contains("\"streaming\""));
        assert!(!json.contains("\"transcoder\""));
    }

    #[test]
    fn unhealthy_check_carries_its_message() {
        let check = CheckStatus::unhealthy("Connection refused".to_string());
        let json = serde_json::to_string(&check).unwrap();
        assert!(json.contains("\"status\":\"unhealthy\""));
        assert!(json.contains("Connection refused"));

        let healthy = serde_json::to_string(&CheckStatus::healthy()).unwrap();
        assert!(!healthy.contains("message"));
    }
}
