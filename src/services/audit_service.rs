//! Audit trail service.
//!
//! Every significant mutation lands in the `events` table and is mirrored
//! onto the in-process event bus for SSE subscribers.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::event::AuditEvent;
use crate::services::event_bus::{DomainEvent, EventBus};

/// Entity kinds appearing in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Video,
    Article,
    Course,
    Assignment,
    User,
    Maintenance,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Video => "video",
            EntityType::Article => "article",
            EntityType::Course => "course",
            EntityType::Assignment => "assignment",
            EntityType::User => "user",
            EntityType::Maintenance => "maintenance",
        }
    }
}

/// A pending audit record
pub struct AuditRecord {
    event_type: String,
    entity_type: EntityType,
    entity_id: String,
    actor_id: Option<Uuid>,
    actor_email: Option<String>,
    payload: serde_json::Value,
}

impl AuditRecord {
    pub fn new(
        event_type: impl Into<String>,
        entity_type: EntityType,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            entity_type,
            entity_id: entity_id.into(),
            actor_id: None,
            actor_email: None,
            payload: serde_json::json!({}),
        }
    }

    pub fn actor(mut self, id: Uuid, email: impl Into<String>) -> Self {
        self.actor_id = Some(id);
        self.actor_email = Some(email.into());
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Audit service
pub struct AuditService {
    db: PgPool,
    bus: Arc<EventBus>,
}

impl AuditService {
    pub fn new(db: PgPool, bus: Arc<EventBus>) -> Self {
        Self { db, bus }
    }

    /// Persist a record and broadcast it. Row insert failures propagate;
    /// the broadcast itself cannot fail.
    pub async fn record(&self, record: AuditRecord) -> Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO events (event_type, entity_type, entity_id, actor_id, payload)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(&record.event_type)
        .bind(record.entity_type.as_str())
        .bind(&record.entity_id)
        .bind(record.actor_id)
        .bind(&record.payload)
        .fetch_one(&self.db)
        .await?;

        self.bus.publish(DomainEvent::now(
            record.event_type,
            record.entity_type.as_str(),
            record.entity_id,
            record.actor_email,
        ));

        Ok(id)
    }

    /// Page through the audit trail, newest first.
    pub async fn list(
        &self,
        entity_type: Option<&str>,
        entity_id: Option<&str>,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<AuditEvent>, i64)> {
        let entries = sqlx::query_as::<_, AuditEvent>(
            "SELECT id, event_type, entity_type, entity_id, actor_id, payload, created_at
             FROM events
             WHERE ($1::text IS NULL OR entity_type = $1)
               AND ($2::text IS NULL OR entity_id = $2)
             ORDER BY created_at DESC
             OFFSET $3
             LIMIT $4",
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM events
             WHERE ($1::text IS NULL OR entity_type = $1)
               AND ($2::text IS NULL OR entity_id = $2)",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_one(&self.db)
        .await?;

        Ok((entries, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_names_are_lowercase() {
        assert_eq!(EntityType::Video.as_str(), "video");
        assert_eq!(EntityType::Article.as_str(), "article");
        assert_eq!(EntityType::Course.as_str(), "course");
        assert_eq!(EntityType::Assignment.as_str(), "assignment");
        assert_eq!(EntityType::User.as_str(), "user");
        assert_eq!(EntityType::Maintenance.as_str(), "maintenance");
    }

    #[test]
    fn record_builder_defaults() {
        let record = AuditRecord::new("video.created", EntityType::Video, "abc");
        assert_eq!(record.event_type, "video.created");
        assert_eq!(record.entity_id, "abc");
        assert!(record.actor_id.is_none());
        assert!(record.actor_email.is_none());
        assert_eq!(record.payload, serde_json::json!({}));
    }

    #[test]
    fn record_builder_chain() {
        let actor = Uuid::new_v4();
        let record = AuditRecord::new("article.status_changed", EntityType::Article, "a-1")
            .actor(actor, "editor@law.example.edu")
            .payload(serde_json::json!({"from": "draft", "to": "in_review"}));

        assert_eq!(record.actor_id, Some(actor));
        assert_eq!(record.actor_email.as_deref(), Some("editor@law.example.edu"));
        assert_eq!(record.payload["to"], "in_review");
    }
}
