use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Work-queue row that drives a [`Refund`](super::Refund) through the
/// provider. `id` doubles as the provider idempotency key for the create-refund
/// call — it survives restarts, so replaying the refund worker after a crash
/// produces the same provider-side effect.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefundRequest {
    pub id: Uuid,
    pub refund_id: Uuid,
    pub handler_url: Option<String>,
    pub extra_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
