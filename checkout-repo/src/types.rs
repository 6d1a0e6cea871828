//! Database row types and their conversion into domain entities.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use checkout_types::{
    Currency, Money, Product, ProductId, RepoError, ShippingAddress, Transaction, TransactionId,
    TransactionParts, TransactionStatus,
};

// ─────────────────────────────────────────────────────────────────────────────
// Database row structs
// ─────────────────────────────────────────────────────────────────────────────

/// Product row from database.
#[derive(FromRow)]
pub struct DbProduct {
    pub id: String,
    pub name: String,
    pub price: String,
    pub currency: String,
    pub stock: i64,
    pub category: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: String,
}

/// Transaction row from database.
#[derive(FromRow)]
pub struct DbTransaction {
    pub id: String,
    pub product_id: String,
    pub quantity: i64,
    pub amount: String,
    pub currency: String,
    pub status: String,
    pub customer_email: String,
    pub shipping_address: Option<String>,
    pub gateway_transaction_id: Option<String>,
    pub gateway_reference: Option<String>,
    pub payment_method: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub version: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Column parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

fn parse_uuid(value: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(value).map_err(|e| RepoError::Database(format!("Invalid UUID {value}: {e}")))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepoError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepoError::Database(format!("Invalid timestamp {value}: {e}")))
}

fn parse_money(amount: &str, currency: &str) -> Result<Money, RepoError> {
    let amount = Decimal::from_str(amount)
        .map_err(|e| RepoError::Database(format!("Invalid amount {amount}: {e}")))?;
    let currency = Currency::from_str(currency)?;
    Ok(Money::new(amount, currency)?)
}

fn to_u32(value: i64, column: &str) -> Result<u32, RepoError> {
    u32::try_from(value)
        .map_err(|_| RepoError::Database(format!("Column {column} out of range: {value}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversion to domain types
// ─────────────────────────────────────────────────────────────────────────────

impl DbProduct {
    pub fn into_domain(self) -> Result<Product, RepoError> {
        Ok(Product::from_parts(
            ProductId::from_uuid(parse_uuid(&self.id)?),
            self.name,
            parse_money(&self.price, &self.currency)?,
            to_u32(self.stock, "stock")?,
            self.category,
            self.description,
            self.image_url,
            parse_timestamp(&self.created_at)?,
        ))
    }
}

impl DbTransaction {
    pub fn into_domain(self) -> Result<Transaction, RepoError> {
        let shipping = self
            .shipping_address
            .as_deref()
            .map(serde_json::from_str::<ShippingAddress>)
            .transpose()
            .map_err(|e| RepoError::Database(format!("Invalid shipping address: {e}")))?;

        Ok(Transaction::from_parts(TransactionParts {
            id: TransactionId::from_uuid(parse_uuid(&self.id)?),
            product_id: ProductId::from_uuid(parse_uuid(&self.product_id)?),
            quantity: to_u32(self.quantity, "quantity")?,
            amount: parse_money(&self.amount, &self.currency)?,
            status: TransactionStatus::from_str(&self.status)?,
            customer_email: self.customer_email,
            shipping,
            gateway_transaction_id: self.gateway_transaction_id,
            gateway_reference: self.gateway_reference,
            payment_method: self.payment_method,
            error_message: self.error_message,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            version: self.version,
        }))
    }
}
