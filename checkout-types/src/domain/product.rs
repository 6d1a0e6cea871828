//! Product domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::money::Money;
use crate::error::{DomainError, DomainResult};

/// Unique identifier for a Product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ProductId(Uuid);

impl ProductId {
    /// Creates a new random ProductId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a ProductId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProductId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A catalog item that carries stock.
///
/// Stock is the only mutable field; it can only move through
/// [`Product::decrease_stock`] and [`Product::increase_stock`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    price: Money,
    stock: u32,
    category: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
}

/// Products are identity entities: two snapshots of the same product are
/// equal even if their stock differs.
impl PartialEq for Product {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Product {}

impl Product {
    /// Creates a new product.
    ///
    /// # Validation
    /// - Name cannot be empty
    pub fn new(
        name: String,
        price: Money,
        stock: u32,
        category: Option<String>,
        description: Option<String>,
        image_url: Option<String>,
    ) -> DomainResult<Self> {
        if name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Product name cannot be empty".into(),
            ));
        }

        Ok(Self {
            id: ProductId::new(),
            name,
            price,
            stock,
            category,
            description,
            image_url,
            created_at: Utc::now(),
        })
    }

    /// Reconstructs a product from stored fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: ProductId,
        name: String,
        price: Money,
        stock: u32,
        category: Option<String>,
        description: Option<String>,
        image_url: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            price,
            stock,
            category,
            description,
            image_url,
            created_at,
        }
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether `quantity` units can be taken. Zero is always satisfiable.
    pub fn has_stock(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }

    /// Takes `quantity` units out of stock, all or nothing.
    pub fn decrease_stock(&mut self, quantity: u32) -> DomainResult<()> {
        if !self.has_stock(quantity) {
            return Err(DomainError::InsufficientStock {
                product_id: self.id,
                requested: quantity,
                available: self.stock,
            });
        }
        self.stock -= quantity;
        Ok(())
    }

    /// Puts `quantity` units back, e.g. when a reserved order is declined.
    pub fn increase_stock(&mut self, quantity: u32) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::InvalidArgument(
                "Quantity to restock must be positive".into(),
            ));
        }
        self.stock = self.stock.checked_add(quantity).ok_or_else(|| {
            DomainError::InvalidArgument(format!(
                "Restocking {} units would overflow stock of {}",
                quantity, self.stock
            ))
        })?;
        Ok(())
    }

    /// Price of `quantity` units.
    pub fn calculate_total_price(&self, quantity: u32) -> DomainResult<Money> {
        self.price.multiply(quantity)
    }
}
