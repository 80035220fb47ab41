use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::Transaction;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::configuration::Settings;
use crate::domain::Payment;
use crate::domain::PaymentRequest;
use crate::domain::Status;
use crate::events::EventPublisher;
use crate::events::PaymentEvent;
use crate::provider::models::PaymentStatusBody;
use crate::provider::ProviderClient;
use crate::startup::get_connection_pool;

type PgTransaction = Transaction<'static, Postgres>;

async fn claim(
    pool: &PgPool,
    stale_after: Duration,
) -> Result<Option<(PgTransaction, PaymentRequest)>, anyhow::Error> {
    let mut tx = pool.begin().await?;
    let cutoff = Utc::now() - chrono::Duration::from_std(stale_after)?;
    let row = sqlx::query_as!(
        PaymentRequest,
        r#"
        SELECT id, payment_id, handler_url, extra_data, created_at, processed_at
        FROM payment_request
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

async fn load_payment(
    pool: &PgPool,
    payment_id: Uuid,
) -> Result<Payment, anyhow::Error> {
    let payment = sqlx::query_as!(
        Payment,
        r#"
        SELECT id, external_id, user_id, created_at, amount, currency,
               status as "status: Status", external_cancellation_reason
        FROM payment
        WHERE id = $1
        "#,
        payment_id,
    )
    .fetch_one(pool)
    .await?;
    Ok(payment)
}

async fn release(
    mut tx: PgTransaction,
    id: Uuid,
) -> Result<(), anyhow::Error> {
    sqlx::query!(
        "UPDATE payment_request SET processed_at = now() WHERE id = $1",
        id,
    )
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

/// Normalizes the provider's `canceled` spelling and extracts a terminal
/// status, if any.
fn terminal_status(body: &PaymentStatusBody) -> Option<Status> {
    match body.status.as_str() {
        "succeeded" => Some(Status::Succeeded),
        "canceled" | "cancelled" => Some(Status::Cancelled),
        _ => None,
    }
}

async fn commit_terminal(
    mut tx: PgTransaction,
    payment_id: Uuid,
    request: &PaymentRequest,
    status: Status,
    reason: Option<String>,
    publisher: &EventPublisher,
) -> Result<(), anyhow::Error> {
    sqlx::query!(
        "UPDATE payment SET status = $1, external_cancellation_reason = $2 WHERE id = $3",
        status as Status,
        reason,
        payment_id,
    )
    .execute(&mut *tx)
    .await?;

    publisher
        .publish_payment_event(PaymentEvent {
            id: payment_id,
            status,
            extra_data: request.extra_data.clone(),
        })
        .await?;

    if let Some(handler_url) = &request.handler_url {
        let payload = json!({
            "id": payment_id,
            "status": status,
            "extra_data": request.extra_data,
        });
        sqlx::query!(
            r#"
            INSERT INTO handler_notification_request (id, created_at, processed_at, handler_url, data)
            VALUES ($1, now(), NULL, $2, $3)
            "#,
            Uuid::new_v4(),
            handler_url,
            payload,
        )
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query!("DELETE FROM payment_request WHERE id = $1", request.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[tracing::instrument(skip(tx, pool, provider, publisher), fields(payment_request_id = %request.id))]
async fn process_claim(
    tx: PgTransaction,
    request: PaymentRequest,
    pool: &PgPool,
    provider: &ProviderClient,
    publisher: &EventPublisher,
) -> Result<(), anyhow::Error> {
    // The claiming transaction stays open across the provider round-trip so
    // the row lock covers the whole claim, not just the SELECT.
    let payment = load_payment(pool, request.payment_id).await?;
    let response = provider.get_payment(&payment.external_id).await?;
    let body: PaymentStatusBody = response.deserialize()?;

    let Some(status) = terminal_status(&body) else {
        tracing::warn!(provider_status = %body.status, "unrecognized or pending provider status");
        return release(tx, request.id).await;
    };

    let reason = body.cancellation_details.map(|d| d.reason);
    commit_terminal(tx, request.payment_id, &request, status, reason, publisher).await
}

/// Claims and processes at most one `PaymentRequest`. Returns `Ok(true)` if a
/// claim was found (regardless of whether it reached a terminal status), or
/// `Ok(false)` if the queue was empty. Exposed so the test suite can drive
/// the worker deterministically, one tick at a time.
pub async fn poll_tick(
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
pub async fn init_poll_worker(cfg: Settings) -> Result<(), anyhow::Error> {
    let pool = get_connection_pool(&cfg.database);
    let provider = Arc::new(ProviderClient::new(
        cfg.provider.base_url.clone(),
        cfg.provider.shop_id.clone(),
        cfg.provider.secret_key.clone(),
        cfg.provider.connection_timeout(),
    )?);
    let publisher = Arc::new(EventPublisher::start(&cfg.broker.bootstrap_servers).await?);
    let semaphore = Arc::new(Semaphore::new(cfg.workers.poll_concurrency.max(1)));
    let interval = cfg.workers.poll_interval();

    loop {
        match claim(&pool, interval).await {
            Ok(Some((tx, request))) => {
                let permit = Arc::clone(&semaphore).acquire_owned().await?;
                let pool = pool.clone();
                let provider = Arc::clone(&provider);
                let publisher = Arc::clone(&publisher);
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = process_claim(tx, request, &pool, &provider, &publisher).await
                    {
                        tracing::error!(
                            error.cause_chain = ?e,
                            error.message = %e,
                            "poll worker failed on claim",
                        );
                    }
                });
            }
            Ok(None) => tokio::time::sleep(interval).await,
            Err(e) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "poll worker dequeue failed",
                );
                tokio::time::sleep(interval).await;
            }
        }
    }
}
