//! Audit trail listing and the live event stream.

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::sync::broadcast;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::dto::{Pagination, PaginationQuery};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::event::AuditEvent;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_audit_events))
        .route("/stream", get(event_stream))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQuery {
    /// Filter by entity kind (video, article, course, user)
    pub entity_type: Option<String>,
    /// Filter by entity key, usually a UUID
    pub entity_id: Option<String>,
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: PaginationQuery,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditEventResponse {
    pub id: Uuid,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub actor_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<AuditEvent> for AuditEventResponse {
    fn from(e: AuditEvent) -> Self {
        Self {
            id: e.id,
            event_type: e.event_type,
            entity_type: e.entity_type,
            entity_id: e.entity_id,
            actor_id: e.actor_id,
            payload: e.payload,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditListResponse {
    pub events: Vec<AuditEventResponse>,
    pub pagination: Pagination,
}

/// Page through the audit trail, newest first.
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/events",
    tag = "events",
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit events", body = AuditListResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn list_audit_events(
    State(state): State<SharedState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditListResponse>> {
    let (events, total) = state
        .audit
        .list(
            query.entity_type.as_deref(),
            query.entity_id.as_deref(),
            query.pagination.offset(),
            query.pagination.limit(),
        )
        .await?;

    Ok(Json(AuditListResponse {
        events: events.into_iter().map(Into::into).collect(),
        pagination: Pagination::from_query_and_total(&query.pagination, total),
    }))
}

/// Stream domain events via Server-Sent Events.
///
/// Clients receive `entity.changed` events whenever a CRUD operation happens.
/// If a client falls behind, it receives a `lagged` event and should do a full refresh.
#[utoipa::path(
    get,
    path = "/stream",
    context_path = "/api/events",
    tag = "events",
    responses(
        (status = 200, description = "SSE stream of domain events")
    ),
    security(("bearer_auth" = []))
)]
async fn event_stream(
    State(state): State<SharedState>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let mut rx = state.bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data(r#"{"status":"ok"}"#));

        loop {
            match rx.recv().await {
                Ok(domain_event) => {
                    let data = serde_json::to_string(&domain_event).unwrap_or_default();
                    yield Ok(Event::default().event("entity.changed").data(data));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    yield Ok(Event::default()
                        .event("lagged")
                        .data(format!(r#"{{"missed":{n}}}"#)));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("ping"),
    ))
}

#[derive(OpenApi)]
#[openapi(
    paths(list_audit_events, event_stream),
    components(schemas(AuditEventResponse, AuditListResponse))
)]
pub struct EventsApiDoc;
