use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Outbound webhook outbox row. Enqueued after the corresponding event has
/// been published and the entity transition committed; deleted on the first
/// 2xx response from `handler_url`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HandlerNotificationRequest {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub handler_url: String,
    pub data: Value,
}
