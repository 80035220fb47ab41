use gateway_core::admission;
use gateway_core::admission::NewPayment;
use gateway_core::workers::poll_tick;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::path_regex;
use wiremock::Mock;
use wiremock::ResponseTemplate;

use crate::helpers::spawn_app;

/// While one transaction holds the `FOR UPDATE SKIP LOCKED` lock on a
/// request row, a second concurrent claim must skip it rather than block or
/// double-claim it; once the first transaction commits, the row becomes
/// claimable again.
#[tokio::test]
async fn skip_locked_excludes_a_row_already_claimed_by_another_transaction() {
    let app = spawn_app().await;

    Mock::given(method("POST"))
        .and(path("/v3/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": Uuid::new_v4().to_string(),
            "confirmation": {"confirmation_url": "https://c/"},
        })))
        .mount(&app.provider_server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v3/payments/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "whatever",
            "status": "succeeded",
        })))
        .mount(&app.provider_server)
        .await;
    admission::create_payment(
        &app.pool,
        &app.provider,
        NewPayment {
            user_id: Uuid::new_v4(),
            amount: dec!(10.00),
            currency: "RUB",
            return_url: "https://example.com",
            handler_url: None,
            extra_data: None,
        },
    )
    .await
    .unwrap();

    let mut tx1 = app.pool.begin().await.unwrap();
    let claimed_by_tx1 = sqlx::query!(
        r#"
        SELECT id FROM payment_request
        WHERE processed_at IS NULL
        ORDER BY processed_at ASC NULLS FIRST
        FOR UPDATE SKIP LOCKED
        LIMIT 1
        "#,
    )
    .fetch_optional(&mut *tx1)
    .await
    .unwrap();
    assert!(claimed_by_tx1.is_some(), "first transaction should claim the only row");

    // A second transaction racing for the same row must see nothing, not block.
    let mut tx2 = app.pool.begin().await.unwrap();
    let claimed_by_tx2 = sqlx::query!(
        r#"
        SELECT id FROM payment_request
        WHERE processed_at IS NULL
        ORDER BY processed_at ASC NULLS FIRST
        FOR UPDATE SKIP LOCKED
        LIMIT 1
        "#,
    )
    .fetch_optional(&mut *tx2)
    .await
    .unwrap();
    assert!(claimed_by_tx2.is_none(), "second transaction must skip the locked row");
    tx2.commit().await.unwrap();

    tx1.commit().await.unwrap();

    // With tx1's lock released and the row still unprocessed, it's claimable again.
    let claimed = poll_tick(&app.pool, &app.provider, &app.publisher, app.poll_stale_after)
        .await
        .unwrap();
    assert!(claimed);
}

/// Seeding several independent rows and draining them with more concurrent
/// workers than rows must process every row exactly once to completion: the
/// claiming transaction stays open across the provider round-trip, so
/// `FOR UPDATE SKIP LOCKED` keeps a row invisible to every other concurrent
/// claim attempt until the first worker commits or releases it.
#[tokio::test]
async fn concurrent_workers_drain_every_row_to_a_terminal_state() {
    let app = spawn_app().await;
    const ROWS: usize = 6;
    const WORKERS: usize = 16;

    Mock::given(method("POST"))
        .and(path("/v3/payments"))
        .respond_with(|_req: &wiremock::Request| {
            ResponseTemplate::new(200).set_body_json(json!({
                "id": Uuid::new_v4().to_string(),
                "confirmation": {"confirmation_url": "https://c/"},
            }))
        })
        .mount(&app.provider_server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v3/payments/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "whatever",
            "status": "succeeded",
        })))
        .mount(&app.provider_server)
        .await;

    for _ in 0..ROWS {
        admission::create_payment(
            &app.pool,
            &app.provider,
            NewPayment {
                user_id: Uuid::new_v4(),
                amount: dec!(10.00),
                currency: "RUB",
                return_url: "https://example.com",
                handler_url: None,
                extra_data: None,
            },
        )
        .await
        .unwrap();
    }

    // A burst of more concurrent ticks than rows: each row's claim excludes
    // every other concurrent claimer for as long as it's held, so ticks
    // beyond the row count simply find nothing and return `false`.
    futures::future::join_all(
        (0..WORKERS).map(|_| poll_tick(&app.pool, &app.provider, &app.publisher, app.poll_stale_after)),
    )
    .await
    .into_iter()
    .for_each(|r| {
        r.unwrap();
    });

    // The burst may not claim every row if the pool's connection limit
    // serializes some ticks; drain any stragglers sequentially.
    while poll_tick(&app.pool, &app.provider, &app.publisher, std::time::Duration::from_millis(0))
        .await
        .unwrap()
    {}

    let remaining = sqlx::query!("SELECT count(*) as \"n!\" FROM payment_request")
        .fetch_one(&app.pool)
        .await
        .unwrap()
        .n;
    assert_eq!(remaining, 0);

    let succeeded = sqlx::query!(
        "SELECT count(*) as \"n!\" FROM payment WHERE status = 'succeeded'",
    )
    .fetch_one(&app.pool)
    .await
    .unwrap()
    .n;
    assert_eq!(succeeded, ROWS as i64);

    // Every row's claim excludes every other concurrent claimer, so each is
    // published exactly once, not merely at least once.
    let events = app.broker.messages("payment");
    assert_eq!(events.len(), ROWS);
    let published: std::collections::HashSet<_> = events.iter().map(|v| v["id"].clone()).collect();
    assert_eq!(published.len(), ROWS);
}
