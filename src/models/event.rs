//! Persisted audit event model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Audit trail row. The live stream variant is
/// `services::event_bus::DomainEvent`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub actor_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
