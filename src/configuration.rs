use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

/// Top-level settings, assembled from `configuration.yaml` (if present) and
/// environment variables namespaced `APP__<SECTION>__<FIELD>` (spec.md §6:
/// "namespaced by prefix").
#[derive(Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub provider: ProviderSettings,
    pub broker: BrokerSettings,
    pub workers: WorkerSettings,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default)]
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.database_name,
        )
    }

    /// Connect options without a database selected, for creating a fresh
    /// per-test database.
    pub fn connection_without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl { PgSslMode::Require } else { PgSslMode::Prefer };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn connection(&self) -> PgConnectOptions {
        self.connection_without_db().database(&self.database_name)
    }
}

/// Upstream payment provider credentials and connection parameters.
#[derive(Deserialize, Clone)]
pub struct ProviderSettings {
    pub shop_id: String,
    pub secret_key: Secret<String>,
    pub base_url: String,
    pub connection_timeout_secs: f64,
}

impl ProviderSettings {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.connection_timeout_secs)
    }
}

#[derive(Deserialize, Clone)]
pub struct BrokerSettings {
    pub bootstrap_servers: String,
}

/// Poll cadence and per-endpoint timeouts for the three background workers
/// (spec.md §5: "Poll intervals are configurable").
#[derive(Deserialize, Clone)]
pub struct WorkerSettings {
    #[serde(default = "WorkerSettings::default_poll_interval_secs")]
    pub poll_interval_secs: f64,
    #[serde(default = "WorkerSettings::default_refund_interval_secs")]
    pub refund_interval_secs: f64,
    #[serde(default = "WorkerSettings::default_notification_interval_secs")]
    pub notification_interval_secs: f64,
    #[serde(default = "WorkerSettings::default_notification_timeout_secs")]
    pub notification_timeout_secs: f64,
    #[serde(default = "WorkerSettings::default_poll_concurrency")]
    pub poll_concurrency: usize,
}

impl WorkerSettings {
    fn default_poll_interval_secs() -> f64 { 1.0 }

    fn default_refund_interval_secs() -> f64 { 3.0 }

    fn default_notification_interval_secs() -> f64 { 1.0 }

    fn default_notification_timeout_secs() -> f64 { 5.0 }

    fn default_poll_concurrency() -> usize { 1 }

    pub fn poll_interval(&self) -> Duration { Duration::from_secs_f64(self.poll_interval_secs) }

    pub fn refund_interval(&self) -> Duration { Duration::from_secs_f64(self.refund_interval_secs) }

    pub fn notification_interval(&self) -> Duration {
        Duration::from_secs_f64(self.notification_interval_secs)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.notification_timeout_secs)
    }
}

/// Load configuration from `configuration.yaml` in the current directory,
/// overridden by any `APP__SECTION__FIELD` environment variables.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = Config::builder()
        .add_source(File::new("configuration.yaml", FileFormat::Yaml).required(false))
        .add_source(Environment::with_prefix("app").prefix_separator("__").separator("__"))
        .build()?;
    settings.try_deserialize()
}
