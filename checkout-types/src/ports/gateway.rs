//! Payment gateway port.
//!
//! Implementations can be HTTP clients, mock gateways, etc. Amounts cross
//! this boundary in minor units (cents).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Currency, TransactionStatus};
use crate::error::GatewayError;

/// Kind of payment source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethodType {
    Card,
    Nequi,
    Pse,
}

impl PaymentMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodType::Card => "CARD",
            PaymentMethodType::Nequi => "NEQUI",
            PaymentMethodType::Pse => "PSE",
        }
    }
}

impl std::fmt::Display for PaymentMethodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tokenized payment source supplied by the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentMethod {
    #[serde(rename = "type")]
    pub method_type: PaymentMethodType,
    /// Token issued by the gateway's tokenization endpoint
    #[schema(example = "tok_test_12345_ABCDEF")]
    pub token: String,
    /// Card installments
    #[serde(default = "default_installments")]
    #[schema(example = 1)]
    pub installments: u32,
}

fn default_installments() -> u32 {
    1
}

impl PaymentMethod {
    pub fn card(token: impl Into<String>) -> Self {
        Self {
            method_type: PaymentMethodType::Card,
            token: token.into(),
            installments: 1,
        }
    }
}

/// Status reported by the gateway for one of its transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GatewayStatus {
    Pending,
    Approved,
    Declined,
    Voided,
    Error,
}

impl GatewayStatus {
    /// Parses the gateway's status string. Anything unrecognised is treated
    /// as an error outcome.
    pub fn from_gateway_str(s: &str) -> Self {
        match s {
            "PENDING" => GatewayStatus::Pending,
            "APPROVED" => GatewayStatus::Approved,
            "DECLINED" => GatewayStatus::Declined,
            "VOIDED" => GatewayStatus::Voided,
            _ => GatewayStatus::Error,
        }
    }

    /// The local status this outcome settles to. `None` while the gateway is
    /// still working on it.
    pub fn settles_to(&self) -> Option<TransactionStatus> {
        match self {
            GatewayStatus::Pending => None,
            GatewayStatus::Approved => Some(TransactionStatus::Approved),
            GatewayStatus::Declined => Some(TransactionStatus::Declined),
            GatewayStatus::Voided => Some(TransactionStatus::Voided),
            GatewayStatus::Error => Some(TransactionStatus::Error),
        }
    }
}

/// Charge request sent to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub amount_in_cents: i64,
    pub currency: Currency,
    pub customer_email: String,
    /// Merchant reference (our transaction id).
    pub reference: String,
    pub payment_method: PaymentMethod,
}

/// The gateway's view of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentResponse {
    pub id: String,
    pub status: GatewayStatus,
    pub status_message: Option<String>,
    pub reference: String,
    pub amount_in_cents: i64,
    pub currency: String,
    pub payment_method_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

/// Port trait for payment gateways.
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Submits a charge. The response may already be final or still PENDING.
    async fn process_payment(
        &self,
        request: PaymentRequest,
    ) -> Result<PaymentResponse, GatewayError>;

    /// Fetches the current state of a gateway transaction.
    async fn get_transaction_status(
        &self,
        gateway_transaction_id: &str,
    ) -> Result<PaymentResponse, GatewayError>;
}
