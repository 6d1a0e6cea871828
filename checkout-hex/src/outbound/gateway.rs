//! HTTP adapter for the payment gateway (Wompi-style REST API).

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use checkout_types::{
    GatewayError, GatewayStatus, PaymentGateway, PaymentMethod, PaymentRequest, PaymentResponse,
};

use crate::security::integrity_signature;

/// Connection settings for [`HttpPaymentGateway`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub private_key: String,
    pub integrity_secret: String,
    pub timeout: Duration,
}

/// Payment gateway reached over HTTP.
pub struct HttpPaymentGateway {
    config: GatewayConfig,
    http: Client,
}

impl HttpPaymentGateway {
    pub fn new(mut config: GatewayConfig) -> Result<Self, GatewayError> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Http(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn handle_response(&self, resp: Response) -> Result<PaymentResponse, GatewayError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.json::<serde_json::Value>().await.ok();
            tracing::warn!(status = status.as_u16(), ?body, "gateway rejected request");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Envelope = resp
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(envelope.data.into())
    }
}

fn map_send_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Http(err.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire format
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CreateTransactionBody<'a> {
    amount_in_cents: i64,
    currency: &'a str,
    customer_email: &'a str,
    reference: &'a str,
    payment_method: &'a PaymentMethod,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: GatewayTransaction,
}

#[derive(Debug, Deserialize)]
struct GatewayTransaction {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    status: String,
    #[serde(default)]
    status_message: Option<String>,
    reference: String,
    amount_in_cents: i64,
    currency: String,
    #[serde(default)]
    payment_method_type: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    finalized_at: Option<DateTime<Utc>>,
}

impl From<GatewayTransaction> for PaymentResponse {
    fn from(tx: GatewayTransaction) -> Self {
        PaymentResponse {
            id: tx.id,
            status: GatewayStatus::from_gateway_str(&tx.status),
            status_message: tx.status_message,
            reference: tx.reference,
            amount_in_cents: tx.amount_in_cents,
            currency: tx.currency,
            payment_method_type: tx.payment_method_type,
            created_at: tx.created_at,
            finalized_at: tx.finalized_at,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Port implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip(self, request), fields(reference = %request.reference, amount_in_cents = request.amount_in_cents))]
    async fn process_payment(
        &self,
        request: PaymentRequest,
    ) -> Result<PaymentResponse, GatewayError> {
        let currency = request.currency.code();
        let body = CreateTransactionBody {
            amount_in_cents: request.amount_in_cents,
            currency,
            customer_email: &request.customer_email,
            reference: &request.reference,
            payment_method: &request.payment_method,
            signature: integrity_signature(
                &request.reference,
                request.amount_in_cents,
                currency,
                &self.config.integrity_secret,
            ),
        };

        let resp = self
            .http
            .post(self.url("/transactions"))
            .bearer_auth(&self.config.private_key)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let response = self.handle_response(resp).await?;
        tracing::debug!(gateway_id = %response.id, status = ?response.status, "gateway accepted charge");
        Ok(response)
    }

    #[tracing::instrument(skip(self))]
    async fn get_transaction_status(
        &self,
        gateway_transaction_id: &str,
    ) -> Result<PaymentResponse, GatewayError> {
        let resp = self
            .http
            .get(self.url(&format!("/transactions/{gateway_transaction_id}")))
            .bearer_auth(&self.config.private_key)
            .send()
            .await
            .map_err(map_send_error)?;

        self.handle_response(resp).await
    }
}
