use serde::Serialize;
use tokio::sync::broadcast;

/// A domain event published when repository entities change.
#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    /// Event type, e.g. "video.created", "article.status_changed"
    #[serde(rename = "type")]
    pub event_type: String,
    /// Entity kind, e.g. "video", "article", "course"
    pub entity_type: String,
    /// UUID or external key of the affected entity
    pub entity_id: String,
    /// Email of the actor who triggered the change, when known
    pub actor: Option<String>,
    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl DomainEvent {
    /// Create a domain event timestamped to now.
    pub fn now(
        event_type: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        actor: Option<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            actor,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Broadcast-based event bus for domain events.
///
/// Subscribers receive events via `tokio::sync::broadcast`. If a subscriber
/// falls behind, it receives `RecvError::Lagged` and can request a full refresh.
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a domain event. If there are no subscribers the event is dropped silently.
    pub fn publish(&self, event: DomainEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to domain events.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::now(
            "video.created",
            "video",
            "abc-123",
            Some("prof@law.example.edu".into()),
        ));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "video.created");
        assert_eq!(event.entity_type, "video");
        assert_eq!(event.entity_id, "abc-123");
    }

    #[tokio::test]
    async fn no_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        // Publishing with no subscribers should not panic
        bus.publish(DomainEvent::now("video.deleted", "video", "x", None));
    }

    #[tokio::test]
    async fn lagged_subscriber() {
        let bus = EventBus::new(2); // tiny buffer
        let mut rx = bus.subscribe();

        // Overflow the buffer
        for i in 0..5 {
            bus.publish(DomainEvent::now(
                format!("event.{i}"),
                "video",
                i.to_string(),
                None,
            ));
        }

        // First recv should be Lagged
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(_)) => {} // expected
            other => panic!("Expected Lagged, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(DomainEvent::now(
            "course.created",
            "course",
            "course-1",
            Some("registrar@law.example.edu".into()),
        ));

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert_eq!(e1.event_type, e2.event_type);
        assert_eq!(e1.entity_id, e2.entity_id);
    }

    #[tokio::test]
    async fn domain_event_serializes_type_field() {
        let event = DomainEvent::now("article.deleted", "article", "a-42", None);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"article.deleted""#));
        assert!(!json.contains("event_type"));
    }
}
