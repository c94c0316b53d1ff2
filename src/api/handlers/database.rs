//! Admin endpoints for database maintenance migrations.

use axum::{
    extract::{Extension, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::Result;
use crate::services::maintenance_service::{MaintenanceReport, MaintenanceStatus};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/status", get(migration_status))
        .route("/migrate", post(run_migrations))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MigrationStatusResponse {
    pub name: String,
    pub checksum: String,
    pub applied: bool,
    pub applied_at: Option<DateTime<Utc>>,
    pub drifted: bool,
}

impl From<MaintenanceStatus> for MigrationStatusResponse {
    fn from(s: MaintenanceStatus) -> Self {
        Self {
            name: s.name,
            checksum: s.checksum,
            applied: s.applied,
            applied_at: s.applied_at,
            drifted: s.drifted,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MigrationReportResponse {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

impl From<MaintenanceReport> for MigrationReportResponse {
    fn from(r: MaintenanceReport) -> Self {
        Self {
            applied: r.applied,
            skipped: r.skipped,
        }
    }
}

/// Report each maintenance script against the ledger.
#[utoipa::path(
    get,
    path = "/status",
    context_path = "/api/database",
    tag = "database",
    responses(
        (status = 200, description = "Per-script ledger state", body = [MigrationStatusResponse]),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = []))
)]
async fn migration_status(
    State(state): State<SharedState>,
) -> Result<Json<Vec<MigrationStatusResponse>>> {
    let statuses = state.maintenance.status().await?;
    Ok(Json(statuses.into_iter().map(Into::into).collect()))
}

/// Apply every pending maintenance script. Scripts already recorded
/// with a matching checksum are skipped, so re-running is safe.
#[axum::debug_handler]
#[utoipa::path(
    post,
    path = "/migrate",
    context_path = "/api/database",
    tag = "database",
    responses(
        (status = 200, description = "Apply outcome", body = MigrationReportResponse),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = []))
)]
async fn run_migrations(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
) -> Result<Json<MigrationReportResponse>> {
    let report = state
        .maintenance
        .apply_pending(auth.user_id, &auth.email)
        .await?;

    tracing::info!(
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        "Maintenance migrations run"
    );

    Ok(Json(report.into()))
}

#[derive(OpenApi)]
#[openapi(
    paths(migration_status, run_migrations),
    components(schemas(MigrationStatusResponse, MigrationReportResponse))
)]
pub struct DatabaseApiDoc;

// TEMP PROBE — remove
fn __assert_send<T: Send>(_: T) {}
#[allow(dead_code)]
fn __probe(svc: &crate::services::maintenance_service::MaintenanceService) {
    __assert_send(svc.apply_pending(uuid::Uuid::nil(), "x"));
}
