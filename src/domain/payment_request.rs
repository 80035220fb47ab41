use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Work-queue row: "observe this payment until terminal and notify". Its
/// presence means the payment has pending work; the polling worker deletes it
/// in the same transaction as the terminal status commit.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRequest {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub handler_url: Option<String>,
    pub extra_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
