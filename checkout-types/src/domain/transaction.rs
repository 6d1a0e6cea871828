//! Transaction (payment record) and Order domain model.
//!
//! An order is a transaction that carries a shipping address. Both live in
//! the same table and follow the same lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::money::Money;
use super::product::ProductId;
use super::status::TransactionStatus;
use crate::error::{DomainError, DomainResult};

/// Unique identifier for a Transaction.
///
/// Its string form doubles as the merchant reference sent to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Creates a new random TransactionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a TransactionId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TransactionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShippingAddress {
    #[schema(example = "Ana Gómez")]
    pub recipient_name: String,
    #[schema(example = "Calle 123 #45-67")]
    pub address_line: String,
    #[schema(example = "Bogotá")]
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[schema(example = "CO")]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ShippingAddress {
    pub fn validate(&self) -> DomainResult<()> {
        let required = [
            ("recipient_name", &self.recipient_name),
            ("address_line", &self.address_line),
            ("city", &self.city),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DomainError::ValidationError(format!(
                    "Shipping {} cannot be empty",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// Correlation data reported by the gateway alongside a status change.
///
/// Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayData {
    pub transaction_id: Option<String>,
    pub reference: Option<String>,
    pub payment_method: Option<String>,
    pub error_message: Option<String>,
}

/// Every stored field of a transaction, used to rebuild one from storage.
#[derive(Debug, Clone)]
pub struct TransactionParts {
    pub id: TransactionId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub amount: Money,
    pub status: TransactionStatus,
    pub customer_email: String,
    pub shipping: Option<ShippingAddress>,
    pub gateway_transaction_id: Option<String>,
    pub gateway_reference: Option<String>,
    pub payment_method: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

/// The payable unit of checkout.
///
/// The status can only change through [`Transaction::update_status`] (or its
/// derived helpers), which enforces the state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    product_id: ProductId,
    quantity: u32,
    amount: Money,
    status: TransactionStatus,
    customer_email: String,
    shipping: Option<ShippingAddress>,
    gateway_transaction_id: Option<String>,
    gateway_reference: Option<String>,
    payment_method: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

/// An order is a transaction with a shipping address.
pub type Order = Transaction;

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Transaction {}

impl Transaction {
    /// Creates a new PENDING payment record.
    pub fn new(
        product_id: ProductId,
        quantity: u32,
        amount: Money,
        customer_email: String,
    ) -> DomainResult<Self> {
        if quantity == 0 {
            return Err(DomainError::ValidationError(
                "Quantity must be at least 1".into(),
            ));
        }
        let customer_email = customer_email.trim().to_string();
        if customer_email.is_empty() || !customer_email.contains('@') {
            return Err(DomainError::ValidationError(
                "A valid customer email is required".into(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: TransactionId::new(),
            product_id,
            quantity,
            amount,
            status: TransactionStatus::Pending,
            customer_email,
            shipping: None,
            gateway_transaction_id: None,
            gateway_reference: None,
            payment_method: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Creates a new PENDING order (a transaction that ships somewhere).
    pub fn new_order(
        product_id: ProductId,
        quantity: u32,
        total_price: Money,
        customer_email: String,
        shipping: ShippingAddress,
    ) -> DomainResult<Order> {
        shipping.validate()?;
        let mut order = Self::new(product_id, quantity, total_price, customer_email)?;
        order.shipping = Some(shipping);
        Ok(order)
    }

    /// Reconstructs a transaction from stored fields.
    pub fn from_parts(parts: TransactionParts) -> Self {
        Self {
            id: parts.id,
            product_id: parts.product_id,
            quantity: parts.quantity,
            amount: parts.amount,
            status: parts.status,
            customer_email: parts.customer_email,
            shipping: parts.shipping,
            gateway_transaction_id: parts.gateway_transaction_id,
            gateway_reference: parts.gateway_reference,
            payment_method: parts.payment_method,
            error_message: parts.error_message,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
            version: parts.version,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Merchant reference sent to the gateway and echoed back in webhooks.
    pub fn reference(&self) -> String {
        self.id.to_string()
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Total payable amount (the order's total price).
    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn customer_email(&self) -> &str {
        &self.customer_email
    }

    pub fn shipping(&self) -> Option<&ShippingAddress> {
        self.shipping.as_ref()
    }

    pub fn gateway_transaction_id(&self) -> Option<&str> {
        self.gateway_transaction_id.as_deref()
    }

    pub fn gateway_reference(&self) -> Option<&str> {
        self.gateway_reference.as_deref()
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment_method.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Optimistic-concurrency token, maintained by repositories.
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Advances the version after a successful compare-and-swap write.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    pub fn is_settleable(&self) -> bool {
        self.status.is_settleable()
    }

    /// Moves the transaction to `new_status`.
    ///
    /// Returns `Ok(false)` without touching anything when `new_status` is the
    /// current status, so duplicate webhook deliveries and client retries are
    /// absorbed. Otherwise the state machine decides; on success the status
    /// and `updated_at` change and each non-empty gateway field replaces the
    /// stored one.
    pub fn update_status(
        &mut self,
        new_status: TransactionStatus,
        data: GatewayData,
    ) -> DomainResult<bool> {
        let action = format!("move to {}", new_status);
        self.transition(new_status, data, &action)
    }

    /// Records a gateway approval.
    pub fn approve(
        &mut self,
        gateway_transaction_id: impl Into<String>,
        reference: impl Into<String>,
    ) -> DomainResult<bool> {
        self.transition(
            TransactionStatus::Approved,
            GatewayData {
                transaction_id: Some(gateway_transaction_id.into()),
                reference: Some(reference.into()),
                ..GatewayData::default()
            },
            "approve",
        )
    }

    pub fn decline(&mut self, reason: impl Into<String>) -> DomainResult<bool> {
        self.transition(
            TransactionStatus::Declined,
            GatewayData {
                error_message: Some(reason.into()),
                ..GatewayData::default()
            },
            "decline",
        )
    }

    pub fn mark_as_error(&mut self, message: impl Into<String>) -> DomainResult<bool> {
        self.transition(
            TransactionStatus::Error,
            GatewayData {
                error_message: Some(message.into()),
                ..GatewayData::default()
            },
            "mark as error",
        )
    }

    pub fn void(&mut self, reason: impl Into<String>) -> DomainResult<bool> {
        self.transition(
            TransactionStatus::Voided,
            GatewayData {
                error_message: Some(reason.into()),
                ..GatewayData::default()
            },
            "void",
        )
    }

    /// Records gateway identifiers for a charge that has not settled yet,
    /// e.g. a PENDING answer to a payment request. The status is untouched.
    /// Final transactions keep what they have. Returns whether anything
    /// changed.
    pub fn attach_gateway_data(&mut self, data: GatewayData) -> bool {
        if !self.is_settleable() {
            return false;
        }

        let before = (
            self.gateway_transaction_id.clone(),
            self.gateway_reference.clone(),
            self.payment_method.clone(),
        );
        overwrite_if_present(&mut self.gateway_transaction_id, data.transaction_id);
        overwrite_if_present(&mut self.gateway_reference, data.reference);
        overwrite_if_present(&mut self.payment_method, data.payment_method);

        before
            != (
                self.gateway_transaction_id.clone(),
                self.gateway_reference.clone(),
                self.payment_method.clone(),
            )
    }

    fn transition(
        &mut self,
        new_status: TransactionStatus,
        data: GatewayData,
        action: &str,
    ) -> DomainResult<bool> {
        if new_status == self.status {
            return Ok(false);
        }

        if !self.status.can_transition_to(new_status) {
            return Err(DomainError::InvalidTransactionState {
                current_state: self.status,
                attempted_action: action.to_string(),
            });
        }

        self.status = new_status;
        self.updated_at = Utc::now();

        overwrite_if_present(&mut self.gateway_transaction_id, data.transaction_id);
        overwrite_if_present(&mut self.gateway_reference, data.reference);
        overwrite_if_present(&mut self.payment_method, data.payment_method);
        overwrite_if_present(&mut self.error_message, data.error_message);

        Ok(true)
    }
}

fn overwrite_if_present(field: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        *field = Some(value);
    }
}
