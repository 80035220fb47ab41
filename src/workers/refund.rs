use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::Transaction;
use uuid::Uuid;

use crate::configuration::Settings;
use crate::domain::Payment;
use crate::domain::Refund;
use crate::domain::RefundRequest;
use crate::domain::Status;
use crate::events::EventPublisher;
use crate::events::RefundEvent;
use crate::provider::models::CreateRefundRequest;
use crate::provider::models::DomainErrorBody;
use crate::provider::models::MoneyAmount;
use crate::provider::models::PaymentStatusBody;
use crate::provider::ProviderClient;
use crate::startup::get_connection_pool;
use reqwest::StatusCode;

type PgTransaction = Transaction<'static, Postgres>;

async fn claim(
    pool: &PgPool,
    stale_after: Duration,
) -> Result<Option<(PgTransaction, RefundRequest)>, anyhow::Error> {
    let mut tx = pool.begin().await?;
    let cutoff = Utc::now() - chrono::Duration::from_std(stale_after)?;
    let row = sqlx::query_as!(
        RefundRequest,
        r#"
        SELECT id, refund_id, handler_url, extra_data, created_at, processed_at
        FROM refund_request
        WHERE processed_at IS NULL OR processed_at < $1
        ORDER BY processed_at ASC NULLS FIRST
        FOR UPDATE SKIP LOCKED
        LIMIT 1
        "#,
        cutoff,
    )
    .fetch_optional(&mut *tx)
    .await?;
    Ok(row.map(|r| (tx, r)))
}

async fn load_refund_and_payment(
    pool: &PgPool,
    refund_id: Uuid,
) -> Result<(Refund, Payment), anyhow::Error> {
    let refund = sqlx::query_as!(
        Refund,
        r#"
        SELECT id, payment_id, external_id, created_at,
               status as "status: Status", external_cancellation_reason, amount, currency
        FROM refund
        WHERE id = $1
        "#,
        refund_id,
    )
    .fetch_one(pool)
    .await?;
    let payment = sqlx::query_as!(
        Payment,
        r#"
        SELECT id, external_id, user_id, created_at, amount, currency,
               status as "status: Status", external_cancellation_reason
        FROM payment
        WHERE id = $1
        "#,
        refund.payment_id,
    )
    .fetch_one(pool)
    .await?;
    Ok((refund, payment))
}

async fn release(
    mut tx: PgTransaction,
    id: Uuid,
) -> Result<(), anyhow::Error> {
    sqlx::query!(
        "UPDATE refund_request SET processed_at = now() WHERE id = $1",
        id,
    )
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

async fn delete(
    mut tx: PgTransaction,
    id: Uuid,
) -> Result<(), anyhow::Error> {
    sqlx::query!("DELETE FROM refund_request WHERE id = $1", id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Updates the `Refund` row in its own transaction, separate from the
/// broker publish and from the claim's final commit.
async fn update_refund(
    pool: &PgPool,
    refund_id: Uuid,
    external_id: Option<&str>,
    status: Status,
    reason: &Option<String>,
) -> Result<(), anyhow::Error> {
    sqlx::query!(
        r#"
        UPDATE refund
        SET external_id = COALESCE($1, external_id), status = $2, external_cancellation_reason = $3
        WHERE id = $4
        "#,
        external_id,
        status as Status,
        reason.as_deref(),
        refund_id,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Inserts a `HandlerNotificationRequest` in its own transaction, separate
/// from the `Refund` update and from the claim's final commit.
async fn insert_notification(
    pool: &PgPool,
    handler_url: &str,
    payload: &serde_json::Value,
) -> Result<(), anyhow::Error> {
    sqlx::query!(
        r#"
        INSERT INTO handler_notification_request (id, created_at, processed_at, handler_url, data)
        VALUES ($1, now(), NULL, $2, $3)
        "#,
        Uuid::new_v4(),
        handler_url,
        payload,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// The provider's verdict on a refund, resolved from its response.
struct Outcome {
    refund_id: Uuid,
    external_id: Option<String>,
    status: Status,
    reason: Option<String>,
}

/// Drives a provider-confirmed refund to a terminal state: the `Refund`
/// update, the broker publish, and the notification insert are each their
/// own transaction (or no transaction at all, for the publish); only the
/// final `RefundRequest` deletion reuses the claim's original transaction.
async fn commit_terminal(
    tx: PgTransaction,
    pool: &PgPool,
    outcome: Outcome,
    request: &RefundRequest,
    publisher: &EventPublisher,
) -> Result<(), anyhow::Error> {
    let Outcome { refund_id, external_id, status, reason } = outcome;
    update_refund(pool, refund_id, external_id.as_deref(), status, &reason).await?;

    publisher
        .publish_refund_event(RefundEvent {
            id: refund_id,
            status,
            external_cancellation_reason: reason.clone(),
            extra_data: request.extra_data.clone(),
        })
        .await?;

    if let Some(handler_url) = &request.handler_url {
        let payload = json!({
            "id": refund_id,
            "status": status,
            "external_cancellation_reason": reason,
            "extra_data": request.extra_data,
        });
        insert_notification(pool, handler_url, &payload).await?;
    }

    delete(tx, request.id).await
}

#[tracing::instrument(skip(tx, pool, provider, publisher), fields(refund_request_id = %request.id))]
async fn process_claim(
    tx: PgTransaction,
    request: RefundRequest,
    pool: &PgPool,
    provider: &ProviderClient,
    publisher: &EventPublisher,
) -> Result<(), anyhow::Error> {
    // The claiming transaction stays open across the provider round-trip so
    // the row lock covers the whole claim, not just the SELECT.
    let (refund, payment) = load_refund_and_payment(pool, request.refund_id).await?;

    // `request.id` is the durable idempotency key: replaying this claim after
    // a crash between provider-ack and commit reissues the identical key, so
    // the provider returns its original response instead of a new refund.
    let body = CreateRefundRequest {
        payment_id: payment.external_id.clone(),
        amount: MoneyAmount {
            value: refund.amount,
            currency: refund.currency.clone(),
        },
        metadata: Some(json!({ "refund_id": refund.id })),
    };
    let response = provider.create_refund(request.id, &body).await?;

    let (status, reason, external_id) = match response.status {
        StatusCode::OK => {
            let body: PaymentStatusBody = response.deserialize()?;
            let status = match body.status.as_str() {
                "succeeded" => Status::Succeeded,
                "canceled" | "cancelled" => Status::Cancelled,
                other => {
                    tracing::warn!(provider_status = other, "unrecognized refund status");
                    return release(tx, request.id).await;
                }
            };
            (status, body.cancellation_details.map(|d| d.reason), Some(body.id))
        }
        // The provider never created a refund object for a rejected request,
        // so `external_id` stays unset here.
        StatusCode::BAD_REQUEST => {
            let body: DomainErrorBody = response.deserialize()?;
            (Status::Cancelled, Some(body.description), None)
        }
        other => {
            tracing::warn!(provider_status = %other, "transient refund failure, will retry");
            return release(tx, request.id).await;
        }
    };

    let outcome = Outcome { refund_id: refund.id, external_id, status, reason };
    commit_terminal(tx, pool, outcome, &request, publisher).await
}

/// Claims and processes at most one `RefundRequest`. See [`super::poll::poll_tick`].
pub async fn refund_tick(
    pool: &PgPool,
    provider: &ProviderClient,
    publisher: &EventPublisher,
    stale_after: Duration,
) -> Result<bool, anyhow::Error> {
    match claim(pool, stale_after).await? {
        Some((tx, request)) => {
            process_claim(tx, request, pool, provider, publisher).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// To be run as a separate worker, outside the admission facade.
pub async fn init_refund_worker(cfg: Settings) -> Result<(), anyhow::Error> {
    let pool = get_connection_pool(&cfg.database);
    let provider = Arc::new(ProviderClient::new(
        cfg.provider.base_url.clone(),
        cfg.provider.shop_id.clone(),
        cfg.provider.secret_key.clone(),
        cfg.provider.connection_timeout(),
    )?);
    let publisher = EventPublisher::start(&cfg.broker.bootstrap_servers).await?;
    let interval = cfg.workers.refund_interval();

    loop {
        match claim(&pool, interval).await {
            Ok(Some((tx, request))) => {
                if let Err(e) = process_claim(tx, request, &pool, &provider, &publisher).await {
                    tracing::error!(
                        error.cause_chain = ?e,
                        error.message = %e,
                        "refund worker failed on claim",
                    );
                }
            }
            Ok(None) => tokio::time::sleep(interval).await,
            Err(e) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "refund worker dequeue failed",
                );
                tokio::time::sleep(interval).await;
            }
        }
    }
}
