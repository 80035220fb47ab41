use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Status;

/// A refund attempt against a [`Payment`](super::Payment). `external_id` is
/// `None` until the refund worker's provider call returns; at that point
/// `status` becomes terminal in the same update.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Refund {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: Status,
    pub external_cancellation_reason: Option<String>,
    pub amount: Decimal,
    pub currency: String,
}
