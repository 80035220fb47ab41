use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use super::error::DispatchError;

/// Outbound HTTP client for the per-request webhook fanout. Success is HTTP
/// 200 exactly; any other status or a transport failure means the caller
/// should retry later (spec.md §4.3, §6).
pub struct WebhookDispatcher {
    http: Client,
}

impl WebhookDispatcher {
    pub fn new(default_timeout: Duration) -> Result<Self, DispatchError> {
        let http = Client::builder().timeout(default_timeout).build()?;
        Ok(Self { http })
    }

    #[tracing::instrument(skip(self, payload), fields(handler_url = %handler_url))]
    pub async fn notify(
        &self,
        handler_url: &str,
        payload: &Value,
    ) -> Result<bool, DispatchError> {
        let response = self.http.post(handler_url).json(payload).send().await?;
        Ok(response.status() == reqwest::StatusCode::OK)
    }
}
