use std::time::Duration;

use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::error::ProviderError;

/// A non-2xx response is handed back to the caller intact so it can branch on
/// `status` the way spec.md §4.4 requires — only connection-level failures are
/// surfaced as [`ProviderError`].
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl RawResponse {
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, ProviderError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// Thin authenticated HTTP client for the upstream payment provider. Every
/// mutating endpoint carries an `Idempotence-Key` header supplied by the
/// caller — see spec.md §4.4/§4.6 for the rule on which key to use where.
pub struct ProviderClient {
    http: Client,
    base_url: String,
    shop_id: String,
    secret_key: Secret<String>,
}

impl ProviderClient {
    pub fn new(
        base_url: String,
        shop_id: String,
        secret_key: Secret<String>,
        connection_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(connection_timeout).build()?;
        Ok(Self {
            http,
            base_url,
            shop_id,
            secret_key,
        })
    }

    async fn send<B: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        idempotency_key: Option<Uuid>,
        body: Option<&B>,
    ) -> Result<RawResponse, ProviderError> {
        let mut req = self
            .http
            .request(method, format!("{}{path}", self.base_url))
            .basic_auth(&self.shop_id, Some(self.secret_key.expose_secret()));

        if let Some(key) = idempotency_key {
            req = req.header("Idempotence-Key", key.to_string());
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status();
        let body = response.json().await?;
        Ok(RawResponse { status, body })
    }

    /// `POST /v3/payments`. `idempotency_key` should be freshly generated by
    /// the caller — charge creation is not resumable across a crash (spec.md
    /// §4.4, §9).
    pub async fn create_payment<B: Serialize>(
        &self,
        idempotency_key: Uuid,
        body: &B,
    ) -> Result<RawResponse, ProviderError> {
        self.send(reqwest::Method::POST, "/v3/payments", Some(idempotency_key), Some(body))
            .await
    }

    /// `GET /v3/payments/{external_id}`.
    pub async fn get_payment(
        &self,
        external_id: &str,
    ) -> Result<RawResponse, ProviderError> {
        self.send::<()>(reqwest::Method::GET, &format!("/v3/payments/{external_id}"), None, None)
            .await
    }

    /// `POST /v3/refunds`. `idempotency_key` MUST be the owning
    /// `RefundRequest.id` so that replaying after a crash collapses to the
    /// same provider-side effect (spec.md §4.2, §4.4).
    pub async fn create_refund<B: Serialize>(
        &self,
        idempotency_key: Uuid,
        body: &B,
    ) -> Result<RawResponse, ProviderError> {
        self.send(reqwest::Method::POST, "/v3/refunds", Some(idempotency_key), Some(body))
            .await
    }
}
