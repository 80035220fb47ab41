//! Row-level operations backing `POST /payment` and `POST /payment/{id}/refund`.
//!
//! The HTTP facade itself — routing, request validation, auth — lives outside
//! this crate. What's here is the part that must share a transaction with the
//! workers' schema: inserting the entity and its work-queue row atomically.

use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::Payment;
use crate::domain::Refund;
use crate::domain::Status;
use crate::provider::models::Confirmation;
use crate::provider::models::CreatePaymentResponseBody;
use crate::provider::models::CreatePaymentRequest;
use crate::provider::models::MoneyAmount;
use crate::provider::ProviderClient;
use crate::provider::ProviderError;

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("payment does not exist")]
    PaymentDoesntExist,

    #[error("external provider unavailable: {0}")]
    ExternalProviderUnavailable(#[from] ProviderError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Input to [`create_payment`]. Grouped into one struct purely to keep the
/// call site readable; it is not persisted as-is.
pub struct NewPayment<'a> {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: &'a str,
    pub return_url: &'a str,
    pub handler_url: Option<&'a str>,
    pub extra_data: Option<Value>,
}

/// Calls provider create-payment with `capture=true`, then inserts
/// `Payment(status=created)` and `PaymentRequest` atomically. A fresh
/// idempotency key is generated per call — charge creation is not resumable
/// across a crash (spec.md §4.4, §9).
pub async fn create_payment(
    pool: &PgPool,
    provider: &ProviderClient,
    new_payment: NewPayment<'_>,
) -> Result<(Payment, String), AdmissionError> {
    let NewPayment {
        user_id,
        amount,
        currency,
        return_url,
        handler_url,
        extra_data,
    } = new_payment;

    let body = CreatePaymentRequest {
        amount: MoneyAmount {
            value: amount,
            currency: currency.to_string(),
        },
        confirmation: Confirmation {
            kind: "redirect",
            return_url: return_url.to_string(),
        },
        capture: true,
        metadata: None,
    };
    let response = provider.create_payment(Uuid::new_v4(), &body).await?;
    let response: CreatePaymentResponseBody = response.deserialize()?;

    let payment = Payment {
        id: Uuid::new_v4(),
        external_id: response.id,
        user_id,
        created_at: chrono::Utc::now(),
        amount,
        currency: currency.to_string(),
        status: Status::Created,
        external_cancellation_reason: None,
    };

    let mut tx = pool.begin().await?;
    sqlx::query!(
        r#"
        INSERT INTO payment (id, external_id, user_id, created_at, amount, currency, status, external_cancellation_reason)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
        payment.id,
        payment.external_id,
        payment.user_id,
        payment.created_at,
        payment.amount,
        payment.currency,
        payment.status as Status,
        payment.external_cancellation_reason,
    )
    .execute(&mut *tx)
    .await?;
    sqlx::query!(
        r#"
        INSERT INTO payment_request (id, payment_id, handler_url, extra_data, created_at, processed_at)
        VALUES ($1, $2, $3, $4, now(), NULL)
        "#,
        Uuid::new_v4(),
        payment.id,
        handler_url,
        extra_data,
    )
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok((payment, response.confirmation.confirmation_url))
}

/// Verifies the payment exists, then inserts `Refund(status=created,
/// external_id=NULL)` and `RefundRequest` atomically. No external call is
/// made here — deferring to the refund worker is what makes refund creation
/// crash-safe (spec.md §4.6).
pub async fn create_refund(
    pool: &PgPool,
    payment_id: Uuid,
    amount: Decimal,
    currency: &str,
    handler_url: Option<&str>,
    extra_data: Option<Value>,
) -> Result<Refund, AdmissionError> {
    let mut tx = pool.begin().await?;

    let exists = sqlx::query!("SELECT id FROM payment WHERE id = $1", payment_id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
    if !exists {
        return Err(AdmissionError::PaymentDoesntExist);
    }

    let refund = Refund {
        id: Uuid::new_v4(),
        payment_id,
        external_id: None,
        created_at: chrono::Utc::now(),
        status: Status::Created,
        external_cancellation_reason: None,
        amount,
        currency: currency.to_string(),
    };
    sqlx::query!(
        r#"
        INSERT INTO refund (id, payment_id, external_id, created_at, status, external_cancellation_reason, amount, currency)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
        refund.id,
        refund.payment_id,
        refund.external_id,
        refund.created_at,
        refund.status as Status,
        refund.external_cancellation_reason,
        refund.amount,
        refund.currency,
    )
    .execute(&mut *tx)
    .await?;
    sqlx::query!(
        r#"
        INSERT INTO refund_request (id, refund_id, handler_url, extra_data, created_at, processed_at)
        VALUES ($1, $2, $3, $4, now(), NULL)
        "#,
        Uuid::new_v4(),
        refund.id,
        handler_url,
        extra_data,
    )
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(refund)
}
