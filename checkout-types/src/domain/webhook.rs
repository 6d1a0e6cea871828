//! Events pushed by the payment gateway.

use serde_json::Value;

/// Event name the gateway uses for transaction status changes.
pub const TRANSACTION_UPDATED: &str = "transaction.updated";

/// Status string the gateway reports for a successful charge.
pub const GATEWAY_SUCCESS_STATUS: &str = "APPROVED";

/// A parsed gateway webhook.
///
/// Only the fields the reconciliation path needs are kept; the raw payload
/// stays with the caller for signature checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEvent {
    pub event: String,
    /// Merchant reference, i.e. our transaction id.
    pub reference: String,
    pub status: String,
    /// The gateway's own transaction id, when present.
    pub gateway_transaction_id: Option<String>,
    /// Payment source token, when present.
    pub payment_token: Option<String>,
}

impl GatewayEvent {
    /// Extracts an event from a raw payload of the shape
    /// `{event, data: {transaction: {id?, reference, status, payment_method?: {token?}}}}`.
    ///
    /// Returns `None` for anything malformed; such deliveries are ignored.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let event = payload.get("event")?.as_str()?;
        let transaction = payload.get("data")?.get("transaction")?;
        let reference = transaction.get("reference")?.as_str()?;
        let status = transaction.get("status")?.as_str()?;

        let gateway_transaction_id = transaction.get("id").and_then(value_as_string);
        let payment_token = transaction
            .get("payment_method")
            .and_then(|pm| pm.get("token"))
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        Some(Self {
            event: event.to_string(),
            reference: reference.to_string(),
            status: status.to_string(),
            gateway_transaction_id,
            payment_token,
        })
    }

    pub fn is_transaction_update(&self) -> bool {
        self.event == TRANSACTION_UPDATED
    }

    pub fn reports_success(&self) -> bool {
        self.status == GATEWAY_SUCCESS_STATUS
    }
}

// Gateways are inconsistent about numeric vs string ids.
fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
