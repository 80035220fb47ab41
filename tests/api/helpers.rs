use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use gateway_core::configuration::DatabaseSettings;
use gateway_core::events::Broker;
use gateway_core::events::EventPublisher;
use gateway_core::events::PublishError;
use gateway_core::provider::ProviderClient;
use gateway_core::telemetry::get_subscriber;
use gateway_core::telemetry::init_subscriber;
use gateway_core::webhook::WebhookDispatcher;
use once_cell::sync::Lazy;
use secrecy::Secret;
use serde_json::Value;
use sqlx::Connection;
use sqlx::Executor;
use sqlx::PgConnection;
use sqlx::PgPool;
use uuid::Uuid;
use wiremock::MockServer;

/// Init a static subscriber, same rationale as the `hejops-ztp` suite this
/// crate grew out of.
///
/// To opt in to verbose logging, use the env var `TEST_LOG`:
///
/// ```sh
///      TEST_LOG=true cargo test [test_name] | bunyan
/// ```
static TRACING: Lazy<()> = Lazy::new(|| match std::env::var("TEST_LOG") {
    Ok(_) => {
        let subscriber = get_subscriber("test", "debug", std::io::stdout);
        init_subscriber(subscriber);
    }
    Err(_) => {
        let subscriber = get_subscriber("test", "debug", std::io::sink);
        init_subscriber(subscriber);
    }
});

/// Stands in for a running broker: records every publish in memory so tests
/// can assert on it directly (spec.md §8: "verified by instrumenting the
/// broker").
#[derive(Default, Clone)]
pub struct RecordingBroker {
    published: Arc<Mutex<Vec<(&'static str, Value)>>>,
}

impl RecordingBroker {
    pub fn messages(
        &self,
        topic: &str,
    ) -> Vec<Value> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == topic)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

#[async_trait]
impl Broker for RecordingBroker {
    async fn publish(
        &self,
        topic: &'static str,
        payload: Vec<u8>,
    ) -> Result<(), PublishError> {
        let value: Value = serde_json::from_slice(&payload)?;
        self.published.lock().unwrap().push((topic, value));
        Ok(())
    }
}

fn test_database_settings() -> DatabaseSettings {
    DatabaseSettings {
        username: "postgres".into(),
        password: Secret::new("postgres".into()),
        port: 5432,
        host: "localhost".into(),
        database_name: Uuid::new_v4().to_string(),
        require_ssl: false,
    }
}

/// Create a randomly named database and run migrations against it, mirroring
/// the per-test database convention this suite's ancestor (`hejops-ztp`)
/// uses.
async fn configure_database(cfg: &DatabaseSettings) -> PgPool {
    let mut conn = PgConnection::connect_with(&cfg.connection_without_db())
        .await
        .expect("postgres must be running");

    conn.execute(format!(r#"CREATE DATABASE "{}";"#, cfg.database_name).as_str())
        .await
        .unwrap();

    let pool = PgPool::connect_with(cfg.connection()).await.unwrap();
    sqlx::migrate!().run(&pool).await.expect("failed to migrate");
    pool
}

pub struct TestApp {
    pub pool: PgPool,
    pub provider_server: MockServer,
    pub handler_server: MockServer,
    pub provider: ProviderClient,
    pub broker: RecordingBroker,
    pub publisher: EventPublisher,
    pub dispatcher: WebhookDispatcher,
    pub poll_stale_after: Duration,
    pub notify_stale_after: Duration,
}

pub async fn spawn_app() -> TestApp {
    Lazy::force(&TRACING);

    let provider_server = MockServer::start().await;
    let handler_server = MockServer::start().await;

    let cfg = test_database_settings();
    let pool = configure_database(&cfg).await;

    let provider = ProviderClient::new(
        provider_server.uri(),
        "shop-id".into(),
        Secret::new("secret-key".into()),
        Duration::from_secs(5),
    )
    .unwrap();

    let broker = RecordingBroker::default();
    let publisher = EventPublisher::with_broker(Box::new(broker.clone()));

    let dispatcher = WebhookDispatcher::new(Duration::from_secs(5)).unwrap();

    TestApp {
        pool,
        provider_server,
        handler_server,
        provider,
        broker,
        publisher,
        dispatcher,
        poll_stale_after: Duration::from_millis(1),
        notify_stale_after: Duration::from_millis(1),
    }
}
