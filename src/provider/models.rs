use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct MoneyAmount {
    pub value: Decimal,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct Confirmation {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub return_url: String,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentRequest {
    pub amount: MoneyAmount,
    pub confirmation: Confirmation,
    pub capture: bool,
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct CreateRefundRequest {
    pub payment_id: String,
    pub amount: MoneyAmount,
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmationResponse {
    pub confirmation_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CancellationDetails {
    pub reason: String,
}

/// Shared shape of `GET /v3/payments/{id}` and the 200 branch of
/// `POST /v3/refunds` and `POST /v3/payments` — all carry `id`, `status`, and
/// an optional `cancellation_details`.
#[derive(Debug, Deserialize)]
pub struct PaymentStatusBody {
    pub id: String,
    pub status: String,
    pub cancellation_details: Option<CancellationDetails>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentResponseBody {
    pub id: String,
    pub confirmation: ConfirmationResponse,
}

/// `400` response body: `{type, code, parameter, description}`.
#[derive(Debug, Deserialize)]
pub struct DomainErrorBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub code: String,
    pub parameter: Option<String>,
    pub description: String,
}
