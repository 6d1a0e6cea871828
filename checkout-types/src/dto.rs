//! Data Transfer Objects (DTOs) for requests and responses.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    Currency, Money, Product, ProductId, ShippingAddress, Transaction, TransactionId,
    TransactionStatus,
};
use crate::ports::PaymentMethod;

// ─────────────────────────────────────────────────────────────────────────────
// Product DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to add a product to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    #[schema(example = "Colombian coffee 500g")]
    pub name: String,
    /// Unit price in major units
    #[schema(value_type = String, example = "50000")]
    pub price: Decimal,
    #[serde(default)]
    pub currency: Currency,
    #[schema(example = 25)]
    pub stock: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    pub category: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Product> for ProductResponse {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id(),
            name: product.name().to_string(),
            price: product.price(),
            stock: product.stock(),
            category: product.category().map(str::to_string),
            description: product.description().map(str::to_string),
            image_url: product.image_url().map(str::to_string),
            created_at: product.created_at(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Order DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Checkout request: buy `quantity` units of a product.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub product_id: ProductId,
    #[schema(example = 2)]
    pub quantity: u32,
    pub shipping_address: ShippingAddress,
    #[schema(example = "buyer@example.com")]
    pub customer_email: String,
}

/// Request to pay a pending order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessPaymentRequest {
    pub payment_method: PaymentMethod,
}

/// Request to cancel an unpaid order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct VoidOrderRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "Customer changed their mind")]
    pub reason: Option<String>,
}

/// An order/transaction as seen by API clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: TransactionId,
    /// Merchant reference shared with the gateway
    pub reference: String,
    pub product_id: ProductId,
    pub quantity: u32,
    pub total_price: Money,
    pub status: TransactionStatus,
    pub customer_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Transaction> for OrderResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id(),
            reference: tx.reference(),
            product_id: tx.product_id(),
            quantity: tx.quantity(),
            total_price: tx.amount(),
            status: tx.status(),
            customer_email: tx.customer_email().to_string(),
            shipping_address: tx.shipping().cloned(),
            gateway_transaction_id: tx.gateway_transaction_id().map(str::to_string),
            gateway_reference: tx.gateway_reference().map(str::to_string),
            payment_method: tx.payment_method().map(str::to_string),
            error_message: tx.error_message().map(str::to_string),
            created_at: tx.created_at(),
            updated_at: tx.updated_at(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Webhook DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// What happened to a gateway webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAckStatus {
    Processed,
    Ignored,
    NotFound,
}

/// Acknowledgement returned to the gateway for every delivery.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub status: WebhookAckStatus,
}
