use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Status;

/// A charge attempt against the provider. `status` starts at `Created` and
/// moves to `Succeeded` or `Cancelled` exactly once, driven by the polling
/// worker.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub external_id: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub amount: Decimal,
    pub currency: String,
    pub status: Status,
    pub external_cancellation_reason: Option<String>,
}
