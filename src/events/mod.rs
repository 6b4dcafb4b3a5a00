//! Activity log for identity and grant mutations.
//!
//! Handlers publish on a broadcast bus and move on; a background listener
//! persists events into `activity_log`. Publishing never fails a request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub payload: Value,
}

pub type EventBus = broadcast::Sender<DomainEvent>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<DomainEvent>) {
    broadcast::channel(1024)
}

/// Where a request came from, for the audit trail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    #[serde(rename = "new", skip_serializing_if = "Option::is_none")]
    pub current: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
    pub severity: Severity,
}

/// Publish `<entity_type>.<action>` with old/new state. `current` is `None`
/// for deletions.
pub fn log_activity<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Uuid,
    current: Option<&T>,
    old: Option<&T>,
    context: RequestContext,
) {
    let Some(subject) = current.or(old) else {
        return;
    };

    let payload = ActivityPayload {
        current: current.and_then(|e| serde_json::to_value(e).ok()),
        old: old.and_then(|e| serde_json::to_value(e).ok()),
        context: Some(context),
        severity: subject.severity_for_action(action),
    };

    let event = DomainEvent {
        id: Uuid::new_v4(),
        name: format!("{}.{}", T::entity_type(), action),
        occurred_at: Utc::now(),
        actor_id: Some(actor_id),
        subject_id: Some(subject.subject_id()),
        payload: serde_json::to_value(&payload).unwrap_or_default(),
    };

    // no receivers is fine
    let _ = event_bus.send(event);
}

pub async fn start_activity_listener(mut rx: broadcast::Receiver<DomainEvent>, pool: SqlitePool) {
    tracing::info!("activity listener started");
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "activity listener lagged, events dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if let Err(e) = persist(&pool, &event).await {
            tracing::error!(event = %event.name, "failed to save activity log: {}", e);
        }
    }
}

async fn persist(pool: &SqlitePool, event: &DomainEvent) -> Result<(), sqlx::Error> {
    let properties = serde_json::to_string(&event.payload).unwrap_or_default();

    sqlx::query(
        "INSERT INTO activity_log (id, event_name, actor_id, subject_id, occurred_at, properties) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(event.id.to_string())
    .bind(&event.name)
    .bind(event.actor_id.map(|u| u.to_string()))
    .bind(event.subject_id.map(|u| u.to_string()))
    .bind(event.occurred_at.to_rfc3339())
    .bind(properties)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Thing {
        id: Uuid,
    }

    impl Loggable for Thing {
        fn entity_type() -> &'static str { "thing" }
        fn subject_id(&self) -> Uuid { self.id }
    }

    #[tokio::test]
    async fn publishes_named_event_with_old_and_new() {
        let (bus, mut rx) = init_event_bus();
        let actor = Uuid::new_v4();
        let before = Thing { id: Uuid::new_v4() };
        let after = Thing { id: before.id };

        log_activity(&bus, "updated", actor, Some(&after), Some(&before), RequestContext::default());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, "thing.updated");
        assert_eq!(event.actor_id, Some(actor));
        assert_eq!(event.subject_id, Some(before.id));
        assert!(event.payload.get("new").is_some());
        assert!(event.payload.get("old").is_some());
    }

    #[tokio::test]
    async fn deletions_are_critical() {
        let (bus, mut rx) = init_event_bus();
        let gone = Thing { id: Uuid::new_v4() };

        log_activity(&bus, "deleted", Uuid::new_v4(), None, Some(&gone), RequestContext::default());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.payload["severity"], "critical");
        assert!(event.payload.get("new").is_none());
    }
}
