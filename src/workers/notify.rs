use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::Transaction;
use uuid::Uuid;

use crate::configuration::Settings;
use crate::domain::HandlerNotificationRequest;
use crate::startup::get_connection_pool;
use crate::webhook::WebhookDispatcher;

type PgTransaction = Transaction<'static, Postgres>;

async fn claim(
    pool: &PgPool,
    stale_after: Duration,
) -> Result<Option<(PgTransaction, HandlerNotificationRequest)>, anyhow::Error> {
    let mut tx = pool.begin().await?;
    let cutoff = Utc::now() - chrono::Duration::from_std(stale_after)?;
    let row = sqlx::query_as!(
        HandlerNotificationRequest,
        r#"
        SELECT id, created_at, processed_at, handler_url, data
        FROM handler_notification_request
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

async fn delete(
    mut tx: PgTransaction,
    id: Uuid,
) -> Result<(), anyhow::Error> {
    sqlx::query!("DELETE FROM handler_notification_request WHERE id = $1", id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

async fn release(
    mut tx: PgTransaction,
    id: Uuid,
) -> Result<(), anyhow::Error> {
    sqlx::query!(
        "UPDATE handler_notification_request SET processed_at = now() WHERE id = $1",
        id,
    )
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

#[tracing::instrument(skip(tx, dispatcher), fields(handler_notification_request_id = %request.id))]
async fn process_claim(
    tx: PgTransaction,
    request: HandlerNotificationRequest,
    dispatcher: &WebhookDispatcher,
) -> Result<(), anyhow::Error> {
    // The claiming transaction stays open across the webhook round-trip so
    // the row lock covers the whole claim, not just the SELECT.
    let delivered = match dispatcher.notify(&request.handler_url, &request.data).await {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!(
                error.cause_chain = ?e,
                error.message = %e,
                "failed to reach handler, will retry",
            );
            false
        }
    };

    if delivered {
        delete(tx, request.id).await
    } else {
        release(tx, request.id).await
    }
}

/// Claims and processes at most one `HandlerNotificationRequest`. See
/// [`super::poll::poll_tick`].
pub async fn notify_tick(
    pool: &PgPool,
    dispatcher: &WebhookDispatcher,
    stale_after: Duration,
) -> Result<bool, anyhow::Error> {
    match claim(pool, stale_after).await? {
        Some((tx, request)) => {
            process_claim(tx, request, dispatcher).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// To be run as a separate worker, outside the admission facade.
pub async fn init_notification_worker(cfg: Settings) -> Result<(), anyhow::Error> {
    let pool = get_connection_pool(&cfg.database);
    let dispatcher = WebhookDispatcher::new(cfg.workers.notification_timeout())?;
    let interval = cfg.workers.notification_interval();

    loop {
        match claim(&pool, interval).await {
            Ok(Some((tx, request))) => {
                if let Err(e) = process_claim(tx, request, &dispatcher).await {
                    tracing::error!(
                        error.cause_chain = ?e,
                        error.message = %e,
                        "notification worker failed on claim",
                    );
                }
            }
            Ok(None) => tokio::time::sleep(interval).await,
            Err(e) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "notification worker dequeue failed",
                );
                tokio::time::sleep(interval).await;
            }
        }
    }
}
